/// Child indices from the root, one per tree level, consumed head-first.
///
/// The empty path addresses the root group itself.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct LayerPath(Vec<usize>);

impl LayerPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn new(indices: Vec<usize>) -> Self {
        Self(indices)
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Index within the parent, `None` for the root.
    pub fn last(&self) -> Option<usize> {
        self.0.last().copied()
    }

    /// Path of the parent group, `None` for the root.
    pub fn parent(&self) -> Option<LayerPath> {
        if self.0.is_empty() {
            None
        } else {
            Some(LayerPath(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    pub fn child(&self, index: usize) -> LayerPath {
        let mut indices = self.0.clone();
        indices.push(index);
        LayerPath(indices)
    }

    /// Same parent, different trailing index.
    pub fn with_last(&self, index: usize) -> LayerPath {
        let mut indices = self.0.clone();
        match indices.last_mut() {
            Some(last) => *last = index,
            None => indices.push(index),
        }
        LayerPath(indices)
    }
}

impl From<Vec<usize>> for LayerPath {
    fn from(indices: Vec<usize>) -> Self {
        Self(indices)
    }
}

impl std::fmt::Display for LayerPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, idx) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", idx)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_and_siblings() {
        let p = LayerPath::new(vec![1, 2]);
        assert_eq!(p.parent(), Some(LayerPath::new(vec![1])));
        assert_eq!(p.with_last(0), LayerPath::new(vec![1, 0]));
        assert_eq!(LayerPath::root().parent(), None);
        assert_eq!(p.to_string(), "[1, 2]");
    }
}

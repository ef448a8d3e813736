// ============================================================================
// DEVICE CONTEXT: wgpu Device, Queue, and adapter initialization
// ============================================================================

use std::sync::Arc;

/// Upper bound on texture units exposed to the slot manager.
const MAX_UNITS: u32 = 32;

/// The wgpu resources the hardware backend renders with.
/// Created once; if creation fails the caller falls back to the CPU backend.
pub struct DeviceContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub adapter_name: String,
    /// Maximum texture dimension supported by this device.
    pub max_texture_dim: u32,
    /// Sampled textures per shader stage, capped at `MAX_UNITS`.
    pub texture_units: u32,
}

impl DeviceContext {
    /// Opens a device on the adapter named by `preferred_gpu` (substring,
    /// case-insensitive; empty = any), else the best hardware adapter, else
    /// the fallback rasterizer.
    pub fn new(preferred_gpu: &str) -> Option<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        if let Some(adapter) = named_adapter(&instance, preferred_gpu)
            && let Some(ctx) = pollster::block_on(Self::open(adapter, false))
        {
            return Some(ctx);
        }
        for fallback in [false, true] {
            let options = wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: fallback,
            };
            if let Some(adapter) = pollster::block_on(instance.request_adapter(&options))
                && let Some(ctx) = pollster::block_on(Self::open(adapter, fallback))
            {
                return Some(ctx);
            }
            if !fallback {
                crate::log_warn!("gpu: hardware adapter unavailable, trying software fallback");
            }
        }
        None
    }

    async fn open(adapter: wgpu::Adapter, fallback: bool) -> Option<Self> {
        let adapter_name = adapter.get_info().name;
        let limits = adapter.limits();
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("paintfe-engine"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits {
                        max_texture_dimension_2d: limits.max_texture_dimension_2d,
                        ..wgpu::Limits::downlevel_defaults()
                    },
                },
                None,
            )
            .await
            .map_err(|e| crate::log_err!("gpu: device request on '{}' failed: {}", adapter_name, e))
            .ok()?;

        crate::log_info!(
            "gpu: using adapter '{}'{}",
            adapter_name,
            if fallback { " (fallback)" } else { "" }
        );
        Some(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_name,
            max_texture_dim: limits.max_texture_dimension_2d,
            texture_units: limits.max_sampled_textures_per_shader_stage.min(MAX_UNITS),
        })
    }

    /// Check if a texture of the given dimensions can be created.
    pub fn supports_size(&self, width: u32, height: u32) -> bool {
        width <= self.max_texture_dim && height <= self.max_texture_dim
    }

    /// Submit a single encoder's commands.
    pub fn submit_one(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

fn named_adapter(instance: &wgpu::Instance, preferred_gpu: &str) -> Option<wgpu::Adapter> {
    if preferred_gpu.trim().is_empty() {
        return None;
    }
    let found = instance
        .enumerate_adapters(wgpu::Backends::all())
        .into_iter()
        .find(|a| adapter_matches(&a.get_info().name, preferred_gpu));
    if found.is_none() {
        crate::log_warn!("gpu: no adapter matches '{}'", preferred_gpu);
    }
    found
}

fn adapter_matches(adapter_name: &str, preferred_gpu: &str) -> bool {
    let wanted = preferred_gpu.trim().to_lowercase();
    !wanted.is_empty() && adapter_name.to_lowercase().contains(&wanted)
}

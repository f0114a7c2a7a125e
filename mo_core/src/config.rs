use crate::error::AppError;
use mo_renderpass::RendererSettings;
use mo_vk::BINDLESS_CAPACITY;
use std::time::Duration;

/// Largest accepted shadow map edge.
const MAX_SHADOW_MAP_SIZE: u32 = 16384;

/// Startup configuration of the window and renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    pub title: String,
    /// Initial inner size in physical pixels.
    pub size: [u32; 2],
    pub bindless_capacity: u32,
    pub shadow_map_size: u32,
    /// Depth padding factor of the fitted light frustum.
    pub shadow_z_mult: f32,
    /// Use mailbox presentation when the surface supports it, FIFO otherwise.
    pub prefer_mailbox: bool,
    /// How long a resize event waits for the render thread.
    pub resize_ack_timeout: Duration,
    pub validation: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        let settings = RendererSettings::default();
        Self {
            title: "mo deferred".to_owned(),
            size: [1280, 720],
            bindless_capacity: settings.bindless_capacity,
            shadow_map_size: settings.shadow_map_size,
            shadow_z_mult: settings.shadow_z_mult,
            prefer_mailbox: false,
            resize_ack_timeout: Duration::from_millis(500),
            validation: cfg!(debug_assertions),
        }
    }
}

impl RendererConfig {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = [width, height];
        self
    }

    pub fn with_bindless_capacity(mut self, capacity: u32) -> Self {
        self.bindless_capacity = capacity;
        self
    }

    pub fn with_shadow_map_size(mut self, size: u32) -> Self {
        self.shadow_map_size = size;
        self
    }

    pub fn with_shadow_z_mult(mut self, z_mult: f32) -> Self {
        self.shadow_z_mult = z_mult;
        self
    }

    pub fn with_mailbox(mut self, prefer_mailbox: bool) -> Self {
        self.prefer_mailbox = prefer_mailbox;
        self
    }

    pub fn with_resize_ack_timeout(mut self, timeout: Duration) -> Self {
        self.resize_ack_timeout = timeout;
        self
    }

    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> Result<(), AppError> {
            Err(AppError::InvalidConfig {
                field,
                reason: reason.into(),
            })
        }

        if self.size[0] == 0 || self.size[1] == 0 {
            return invalid("size", format!("must be non-zero, got {:?}", self.size));
        }
        // Two slots are taken by the default white and flat-normal textures.
        if !(2..=BINDLESS_CAPACITY).contains(&self.bindless_capacity) {
            return invalid(
                "bindless_capacity",
                format!(
                    "must be in 2..={BINDLESS_CAPACITY}, got {}",
                    self.bindless_capacity
                ),
            );
        }
        if self.shadow_map_size == 0 || self.shadow_map_size > MAX_SHADOW_MAP_SIZE {
            return invalid(
                "shadow_map_size",
                format!(
                    "must be in 1..={MAX_SHADOW_MAP_SIZE}, got {}",
                    self.shadow_map_size
                ),
            );
        }
        if !self.shadow_z_mult.is_finite() || self.shadow_z_mult < 1.0 {
            return invalid(
                "shadow_z_mult",
                format!("must be a finite value >= 1, got {}", self.shadow_z_mult),
            );
        }
        if self.resize_ack_timeout.is_zero() {
            return invalid("resize_ack_timeout", "must be non-zero");
        }
        Ok(())
    }

    pub fn renderer_settings(&self) -> RendererSettings {
        RendererSettings {
            bindless_capacity: self.bindless_capacity,
            shadow_map_size: self.shadow_map_size,
            shadow_z_mult: self.shadow_z_mult,
        }
    }
}

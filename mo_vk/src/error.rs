use std::fmt::Debug;
use thiserror::Error;
use vulkano::image::ImageLayout;

/// Fatal GPU-side failures. None of these are retried: an out of memory condition or a
/// malformed request does not get better on a second attempt.
#[derive(Debug, Error)]
pub enum VkError {
    #[error("vulkan call failed during `{op}`: {message}")]
    Vulkan { op: &'static str, message: String },

    #[error("no physical device supports graphics + presentation to the window surface")]
    NoSuitableDevice,

    #[error("surface reports no usable {what}")]
    UnsupportedSurface { what: &'static str },

    #[error("unsupported image layout transition {old:?} -> {new:?}")]
    UnsupportedLayoutTransition { old: ImageLayout, new: ImageLayout },

    #[error("bindless texture capacity of {capacity} slots exhausted")]
    BindlessCapacityExceeded { capacity: u32 },

    #[error("invalid render pass attachments: {0}")]
    InvalidAttachments(String),
}

pub type VkResult<T> = Result<T, VkError>;

/// Attaches the failing operation's name to any vulkano error.
pub trait VkResultExt<T> {
    fn vk_op(self, op: &'static str) -> VkResult<T>;
}

impl<T, E: Debug> VkResultExt<T> for Result<T, E> {
    fn vk_op(self, op: &'static str) -> VkResult<T> {
        self.map_err(|err| VkError::Vulkan {
            op,
            message: format!("{err:?}"),
        })
    }
}

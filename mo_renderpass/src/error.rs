use mo_vk::VkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PassError {
    #[error(transparent)]
    Vk(#[from] VkError),

    #[error("world is missing the `{0}` resource")]
    MissingResource(&'static str),

    #[error("shader `{0}` has no `main` entry point")]
    MissingEntryPoint(&'static str),
}

pub type PassResult<T> = Result<T, PassError>;

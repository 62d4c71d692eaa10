//! Image generation providers.

mod openrouter;

pub(crate) use openrouter::http_client;

pub use openrouter::{
    OpenRouterProvider, OpenRouterProviderBuilder, DEFAULT_BASE_URL, DEFAULT_MODEL,
    DEFAULT_TEMPERATURE, MAX_TEMPERATURE, MIN_TEMPERATURE,
};

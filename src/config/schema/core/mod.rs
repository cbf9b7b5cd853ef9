mod env_overrides;
mod loader;
mod types;

#[cfg(test)]
mod test_env;

pub use types::Config;

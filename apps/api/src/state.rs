use std::sync::Arc;

use crate::config::Config;
use crate::typeset::Toolchain;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Pluggable typesetting toolchain. Default: TectonicToolchain resolving
    /// `tectonic` from the search path. Swap via TECTONIC_PROGRAM env.
    pub toolchain: Arc<dyn Toolchain>,
}

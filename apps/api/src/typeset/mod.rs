// Document compilation pipeline.
// Implements: LaTeX escaping, markdown transpilation, document assembly, and
// the confined toolchain invocation that turns request content into PDF bytes.
// All subprocess work goes through the Toolchain trait; no direct Command
// calls outside compiler.rs.

pub mod compiler;
pub mod escape;
pub mod handlers;
pub mod markdown;
pub mod template;

// Re-export the public API consumed by other modules (routes, state, main).
pub use compiler::{
    compile_markdown, CompileError, CompileOptions, TectonicToolchain, Toolchain,
};

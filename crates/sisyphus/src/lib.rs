//! Sisyphus - compile phase of the autograder
//!
//! Patches submitted sources with compatibility mixins, locates each
//! project's entry point and drives the external Java compiler.

pub mod classpath;
pub mod compiler;
pub mod config;
pub mod locator;
pub mod mixins;
pub mod patcher;

pub use compiler::Compiler;
pub use config::CompilerConfig;
pub use locator::{locate, EntryPoint};
pub use mixins::{Mixin, MixinRule, MixinSet};
pub use patcher::{apply, patch_file, PatchError};

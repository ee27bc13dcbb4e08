use clap::ValueEnum;
use converter_core::models::{ConversionScope, ScopeKind};
use std::path::PathBuf;

/// Value of `convert --kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScopeArg {
    File,
    Folder,
    Drive,
}

impl From<ScopeArg> for ScopeKind {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::File => ScopeKind::File,
            ScopeArg::Folder => ScopeKind::Folder,
            ScopeArg::Drive => ScopeKind::Drive,
        }
    }
}

/// Builds the scope for `path`, inferring the kind when none was given.
pub fn scope_for(path: PathBuf, kind: Option<ScopeArg>) -> ConversionScope {
    let kind = match kind {
        Some(arg) => arg.into(),
        None => ScopeKind::infer(&path),
    };
    ConversionScope::new(path, kind)
}

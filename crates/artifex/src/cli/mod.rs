pub mod app;
pub mod cat;
pub mod detect;
pub mod extract;
pub mod ls;
pub mod pack;
pub mod sizes;

use artifex_archive::{Resolver, Settings};

pub(crate) fn resolver(settings: &Settings) -> Resolver {
    Resolver::default().with_options(settings.resolve_options())
}

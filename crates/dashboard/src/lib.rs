#![cfg_attr(test, allow(unused_crate_dependencies))]
//! Live dashboards over the reactive state store.
//!
//! A [`Dashboard`] declares a template and the sections filling it. A
//! [`DashboardSession`] shows one dashboard for one entity: it renders the
//! sections through [`vitrine_compose::Composer`], hands the document to a
//! [`ViewLayer`], and re-renders whenever a watched state field changes.
//! Sessions are looked up and reused through a [`SessionRegistry`].

pub mod config;
mod dashboard;
mod error;
mod registry;
pub mod runner;
mod session;
mod view;

pub use config::{Config, DashboardOptions, DashboardSpec, NotifyMode, SectionSpec};
pub use dashboard::{Dashboard, DashboardEnv, RenderContext, RerenderHandle};
pub use error::{ConfigError, DashboardError, Result};
pub use registry::SessionRegistry;
pub use runner::{CommandError, CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
pub use session::{DashboardSession, RenderRequest};
pub use view::ViewLayer;

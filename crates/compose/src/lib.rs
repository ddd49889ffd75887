#![cfg_attr(test, allow(unused_crate_dependencies))]
//! Composition of named text sections into one document.
//!
//! A template holds `{name}` placeholders. Each [`Section`] in a
//! [`SectionRegistry`] renders the text for its placeholder; the [`Composer`]
//! splices the results in and records where each section landed as a
//! [`Region`]. A section may expand into a sub-template with further child
//! sections, discovered only while rendering.
//!
//! ```text
//! "A:{a}\nB:{b}\n"  +  a -> "1", b -> "2"
//!   => "A:1\nB:2\n", a = [2, 3), b = [6, 7)
//! ```

mod document;
mod engine;
mod error;
mod registry;
mod section;
mod template;

pub use document::{RegionDiff, RenderedDocument, diff_regions};
pub use engine::{Composer, FallbackFn};
pub use error::{ComposeError, Result, SectionError};
pub use registry::{SectionRegistry, SectionRegistryBuilder};
pub use section::{RenderFn, RenderResult, Section};
pub use template::{PlaceholderMatch, PlaceholderPattern, Template, dedent, placeholder_names};
pub use vitrine_primitives::{Region, RegionMap};

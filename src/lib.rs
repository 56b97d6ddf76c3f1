//! samparse — serverless template parsing.
//!
//! Decodes template markup into a canonical value tree (shorthand tags such as
//! `!Ref` and `!If` become single-key intrinsic mappings), resolves intrinsics
//! through a caller-supplied [`Resolve`] strategy, and binds the result into
//! typed models.
//!
//! ```
//! use samparse::{decode, resolve_all, Context, Intrinsic, Resolve, Value};
//!
//! struct Stage;
//!
//! impl Resolve for Stage {
//!     type Error = std::convert::Infallible;
//!
//!     fn resolve(&self, _ctx: &Context, value: &Value) -> Result<Option<Value>, Self::Error> {
//!         Ok(match value.as_intrinsic() {
//!             Some((Intrinsic::Ref, arg)) if arg.as_str() == Some("Stage") => Some("prod".into()),
//!             _ => None,
//!         })
//!     }
//! }
//!
//! let raw = decode("Name: !Ref Stage\n").unwrap();
//! let resolved = resolve_all(&Context::with_max_depth(10), &raw, Some(&Stage)).unwrap();
//! assert_eq!(resolved.get("Name"), Some(&Value::from("prod")));
//! ```

pub mod core;

pub use crate::core::binder::{bind, BindError, BindOptions};
pub use crate::core::decoder::{decode, decode_file, Decoder, ParseError};
pub use crate::core::intrinsics::{Intrinsic, TagRule, SHORTHAND_TAGS};
pub use crate::core::model::{decode_into, decode_to_model, ModelError, SamTemplate};
pub use crate::core::resolver::{rebuild, resolve_all, Chain, Context, Resolve};
pub use crate::core::value::{Mapping, Value};

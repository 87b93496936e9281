pub mod builtins;
pub mod env;
pub mod error;
pub mod infer;
pub mod registry;
mod signature;
pub mod subst;
pub mod ty;
pub mod unify;
pub mod xml;

pub use env::{TypeEnv, generalize, instantiate};
pub use error::{StructuralError, TypeError};
pub use infer::{Infer, infer};
pub use registry::{GcReport, GcScheduler, TypeVarRegistry};
pub use subst::Substitution;
pub use ty::{ParseTypeError, Type, TypeScheme, TypeVar, VariantError};
pub use unify::{UnifyError, unify};

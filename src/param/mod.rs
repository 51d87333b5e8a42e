// Parameter model - Class registry and range-checked parameters

pub mod class;
pub mod parameter;

pub use class::{ConnectionRules, DisplayFormat, ParamClass, ParamClassDef, ParamKind};
pub use parameter::Parameter;

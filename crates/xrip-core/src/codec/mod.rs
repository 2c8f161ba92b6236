//! Stateless decoders for packed vertex and texture encodings.

pub mod dds;
pub mod faces;
pub mod half;
pub mod position;
pub mod tangent;

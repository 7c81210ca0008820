//! OpenMetrics text export.
pub mod text;

#[cfg(test)]
mod test;

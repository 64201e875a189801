pub mod area;
pub mod calendar;
pub mod cesm;
pub mod coords;
pub mod fdr;
pub mod grid;
mod interpolate;
pub mod mask;
pub mod options;
pub mod python;
pub mod shift;
pub mod stat;

#[cfg(test)]
mod testing;

pub mod errors;

//! Input sensing. The only sensor is the debounced machine-cycle contact.

pub mod cycle;

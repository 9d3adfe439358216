// SPDX-License-Identifier: MIT

//! Per-file caches sitting between the manager and the driver.

mod chunk;
mod meta;
mod sieve;

pub use chunk::ChunkCache;
pub use meta::MetaCache;
pub use sieve::{SieveBuffer, SieveGuard};

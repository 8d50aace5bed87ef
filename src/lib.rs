use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

pub mod common;
pub mod config;
pub mod diffset;
pub mod error;
pub mod growable;
pub mod itemsets;
pub mod nlist;
pub mod p3c;
pub mod ppc;
pub mod selector;
pub mod tidset;

#[cfg(feature = "python")]
mod python;


pub use common::{EncodedData, SupportCount};
pub use config::BuildConfig;
pub use diffset::DiffsetBase;
pub use error::{Error, Result};
pub use growable::GrowableArray;
pub use itemsets::gen_random_itemsets;
pub use nlist::{Nlist, NlistBase, NlistEntry};
pub use p3c::P3cTree;
pub use ppc::{PpcTree, PrePostCounter};
pub use selector::{Selector, SelectorEncoder};
pub use tidset::TidsetBase;

#[cfg(feature = "python")]
use pyo3::prelude::*;

#[cfg(feature = "python")]
#[pymodule]
fn _infobase(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(python::tidset_support_counts, m)?)?;
    m.add_function(wrap_pyfunction!(python::diffset_support_counts, m)?)?;
    m.add_function(wrap_pyfunction!(python::nlist_support_counts, m)?)?;
    Ok(())
}

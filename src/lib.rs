//! # dexfile - Dalvik Executable Container Engine
//!
//! `dexfile` reads, builds and writes `.dex` files. A file is held as a set
//! of typed sections; every cross-reference is a [`Handle`] into an arena, so
//! sections can be reordered and re-placed without fixing up pointers.
//!
//! - **Decode** an existing image, driven by its map directory
//! - **Intern** new content with structural deduplication
//! - **Place** every item at its final index or offset, optionally in a
//!   canonical sorted order or exactly as read
//! - **Write** and stamp the SHA-1 signature and Adler-32 checksum
//!
//! ## Quick Start
//!
//! ```rust
//! use dexfile::{ClassDefItem, DexFile, DexOptions, Result};
//!
//! # fn main() -> Result<()> {
//! let mut file = DexFile::new();
//! let object = file.intern_type("Ljava/lang/Object;");
//! let main = file.intern_type("Lcom/example/Main;");
//!
//! let mut class = ClassDefItem::new(main, 0x1);
//! class.superclass = Some(object);
//! file.intern(class);
//!
//! let bytes = file.to_bytes()?;
//! dexfile::integrity::verify(&bytes)?;
//!
//! let reread = DexFile::from_bytes(&bytes, &DexOptions::default())?;
//! assert_eq!(reread.section::<ClassDefItem>().len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Rewriting an existing file
//!
//! ```rust,no_run
//! use dexfile::{DexFile, DexOptions, Result};
//!
//! # fn main() -> Result<()> {
//! // keep every item where it was
//! let options = DexOptions::new().in_place(true);
//! let mut file = DexFile::open("classes.dex", &options)?;
//! file.save("classes.out.dex")?;
//! # Ok(())
//! # }
//! ```

pub mod core;

pub use crate::core::{
    config::{DexOptions, LayoutPolicy},
    dex_file::{calc_checksum, calc_signature, DexFile, LayoutState},
    error::{DexError, Result},
    header::HeaderItem,
    integrity,
    io::{read_dex, write_dex, DexReader, DexWriter},
    item::{Handle, Item, ReadContext, NO_INDEX},
    items::*,
    kind::{ItemKind, INDEXED_ORDER, OFFSETTED_ORDER, READ_ORDER},
    map::{MapEntry, MapItem},
    section::{Section, SectionInfo, SectionStats},
};

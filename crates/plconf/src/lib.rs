//! # plconf - perl variable files to structured configuration
//!
//! ## Introduction for developers
//!
//! Read this to understand how `plconf` works internally.
//!
//! ### Input
//!
//! Legacy configuration lives in perl files that do nothing but assign variables:
//!
//! ```perl
//! # Product: Widgets
//! require 'common.pl';
//!
//! $base = 100;
//! $rate = 2;
//! $total = $base * $rate;
//!
//! @sizes = ('S', 'M', 'L');
//! %limits = (
//!     min => 1,
//!     max => 10,
//! );
//! ```
//!
//! Only this subset is understood. Everything else in a file is skipped, the files are never executed.
//!
//! ### File order
//!
//! see [require::RequireResolver]
//!
//! The files are loaded in an order given by `require` statements. An aggregator file (`require.pl` or the file with
//! the most requires) is the entry point, every file is processed after the files it requires. Cycles are an error.
//!
//! Without a require graph ([settings::Settings::follow_requires]) each subdirectory of the input is treated as one
//! product instead ([discovery::discover]).
//!
//! ### Namespaces
//!
//! Variables are grouped into namespaces ("products"). Depending on [settings::NamespaceMode] the namespace is the
//! name of the directory a file lives in, or the name given by the last `# Product: <name>` comment.
//!
//! ### Parsing
//!
//! see [parser::LineParser]
//!
//! Each file is decoded ([source::read_source], utf-8 with Shift_JIS fallbacks) and run through a fresh line parser.
//! It emits one [parser::Declaration] per completed statement. Array and hash literals may span multiple lines.
//!
//! ### Evaluation
//!
//! see [store::VariableStore::record] and [expr::Evaluator]
//!
//! Declarations are recorded in order. A right-hand side such as `$base * $rate` gets every reference replaced by the
//! value assigned *so far* in the same namespace. The result must consist of digits, whitespace and `+ - * / . ( )`
//! only, otherwise it is not evaluated at all. What passes is computed by a small arithmetic parser.
//!
//! | declaration              | recorded value                      |
//! |--------------------------|-------------------------------------|
//! | `$base = 100;`           | `100`                               |
//! | `$total = $base * 2;`    | `200`                               |
//! | `$later = $unknown + 1;` | `$unknown + 1` (reported)           |
//! | `$name = 'a-b';`         | `a-b` (quoted strings are literals) |
//!
//! ### Output
//!
//! [assemble::assemble] turns the store into a [assemble::ConfigTree]. Expressions that could not be evaluated are
//! written as their source text and listed in the [diagnostics::Diagnostics]. The tree keeps the order in which
//! namespaces and variables first appeared and is serialized via [serde].
//!
//! ### Failures
//!
//! A file that cannot be decoded or a statement that cannot be parsed never stops a run, it is recorded as an
//! [diagnostics::Issue]. A broken require graph or an unwritable output directory is a [convert::ConvertError].
//!
pub mod assemble;
pub mod convert;
pub mod diagnostics;
pub mod discovery;
pub mod expr;
pub mod parser;
pub mod require;
pub mod settings;
pub mod source;
pub mod store;
pub mod value;

pub use convert::{Conversion, ConversionReport, ConvertError, Converter};
pub use settings::{NamespaceMode, OutputFormat, Settings};

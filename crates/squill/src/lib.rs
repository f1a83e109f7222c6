//! squill: the representation layer of a SQL compiler front end.
//!
//! One crate per concern, re-exported here:
//! - [`parser`]: character classification, tokenizing, keyword resolution;
//! - [`ast`]: expression and query trees with their completeness levels;
//! - [`types`]: the `LogEst` estimate codec, the bounded `Bitmask`, and
//!   the id newtypes;
//! - [`error`]: the shared error enum.
//!
//! ```
//! use squill::ast::{BinaryOp, Expr, ExprList, ParseContext, Select, SrcList};
//! use squill::parser::{TokenKind, Tokenizer};
//! use squill::types::{ColumnIdx, CursorId};
//!
//! // Tokenize a statement...
//! let src = b"SELECT a FROM t WHERE a >= 1";
//! let tokens = Tokenizer::tokenize(src);
//! assert_eq!(tokens[0].kind, TokenKind::KwSelect);
//! assert_eq!(tokens[1].text(src), b"a");
//!
//! // ...and build the tree a parser-action layer would.
//! let mut pc = ParseContext::new();
//! let cursor = pc.next_cursor();
//! let cols = ExprList::new().append(Expr::column(cursor, ColumnIdx(0), None));
//! let filter = Expr::binary(
//!     &pc,
//!     BinaryOp::Ge,
//!     Expr::column(cursor, ColumnIdx(0), None),
//!     Expr::integer(1),
//! )
//! .unwrap();
//! let src_list = SrcList::new().append_table(&pc, None, "t", None).unwrap();
//! let select = Select::new(&mut pc, cols, src_list, Some(filter), None, None, None, None);
//! assert_eq!(select.id.0, 1);
//! # let _ = CursorId(0);
//! ```

pub use squill_ast as ast;
pub use squill_error as error;
pub use squill_parser as parser;
pub use squill_types as types;

pub use squill_error::{Result, SquillError};

mod record;
mod root;

pub use record::{parse_assignment, DefineCommand, DeleteCommand, EditCommand, InsertCommand, ShowCommand};
pub use root::{Cli, Commands, Context};

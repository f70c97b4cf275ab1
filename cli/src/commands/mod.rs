mod catalog;
mod cost;
mod helpers;
mod status;
mod sync;

pub(crate) use catalog::{AddArgs, EditArgs, cmd_add, cmd_edit, cmd_list};
pub(crate) use cost::cmd_cost;
pub(crate) use status::cmd_status;
pub(crate) use sync::cmd_sync;

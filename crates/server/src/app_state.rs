use std::sync::Arc;

use server_api::{Caller, Dispatcher};

use crate::demo::ItemStore;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) dispatcher: Dispatcher,
    pub(crate) caller: Caller,
    pub(crate) items: Arc<ItemStore>,
}

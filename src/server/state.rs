use crate::fit::FontMetrics;
use crate::settings;

#[derive(Clone)]
pub(crate) struct ServerState {
    pub(crate) settings: settings::Settings,
    pub(crate) font: Option<FontMetrics>,
}

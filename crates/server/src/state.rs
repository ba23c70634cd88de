use insight_core::Config;
use insight_llm::Analyst;

pub struct AppState {
    pub analyst: Analyst,
    pub config: Config,
}

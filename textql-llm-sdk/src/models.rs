//! Model constants for supported LLM providers
//!
//! Model IDs are sourced from official provider documentation.

/// Google Gemini model constants
pub mod gemini {
    /// Gemini 2.5 Flash - Fast, low-cost model used for SQL generation
    pub const GEMINI_2_5_FLASH_ID: &str = "gemini-2.5-flash";
    pub const GEMINI_2_5_FLASH_NAME: &str = "Gemini 2.5 Flash";

    /// Gemini 2.5 Pro - Stronger reasoning at higher latency
    pub const GEMINI_2_5_PRO_ID: &str = "gemini-2.5-pro";
    pub const GEMINI_2_5_PRO_NAME: &str = "Gemini 2.5 Pro";

    pub const GEMINI_2_5_FLASH: &str = GEMINI_2_5_FLASH_ID;
    pub const GEMINI_2_5_PRO: &str = GEMINI_2_5_PRO_ID;
}

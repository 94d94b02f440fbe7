//! Collection-trend insights from a hosted language model.
//!
//! One outbound prompt per refresh: a digest of department totals and the
//! top performer, sent to an OpenAI-compatible chat-completions endpoint.
//! [`InsightProvider::summarize`] never fails; failures become one of the
//! fixed fallback messages below so the dashboard always has text to show.

mod client;
mod error;
pub mod prompt;
mod types;

pub use client::InsightClient;
pub use error::InsightError;
pub use types::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage};

use async_trait::async_trait;

use propfee_core::DashboardData;

/// Shown before the first refresh completes.
pub const INSIGHT_INITIAL: &str = "正在分析收缴趋势...";

/// No API key configured.
pub const INSIGHT_DISABLED: &str = "AI 功能未启用：请配置 API Key。";

/// Endpoint reported an exhausted quota.
pub const INSIGHT_RATE_LIMITED: &str = "AI 建议暂时不可用：已达到 API 额度上限。请稍后再试。";

/// Endpoint answered without content.
pub const INSIGHT_EMPTY: &str = "分析暂时不可用";

/// Source of insight text for the dashboard.
#[async_trait]
pub trait InsightProvider: Send + Sync {
    /// Summarize the collections into prose. Never fails.
    async fn summarize(&self, data: &DashboardData) -> String;
}

/// User-facing text for a failed insight request.
#[must_use]
pub fn fallback_message(error: &InsightError) -> String {
    match error {
        InsightError::Disabled => INSIGHT_DISABLED.to_owned(),
        e if e.is_rate_limited() => INSIGHT_RATE_LIMITED.to_owned(),
        e => format!("暂时无法生成AI建议：{e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_messages() {
        assert_eq!(fallback_message(&InsightError::Disabled), INSIGHT_DISABLED);
        assert_eq!(
            fallback_message(&InsightError::RateLimited),
            INSIGHT_RATE_LIMITED
        );
        assert_eq!(
            fallback_message(&InsightError::Parse("bad json".to_owned())),
            "暂时无法生成AI建议：parse error: bad json"
        );
    }
}

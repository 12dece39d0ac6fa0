//! In-memory insight memo exposed as the `memo://insights` resource.

use tokio::sync::RwLock;

pub const MEMO_URI: &str = "memo://insights";
pub const MEMO_NAME: &str = "Data Insights Memo";
pub const MEMO_DESCRIPTION: &str = "A living document of discovered data insights";

/// Insights appended by the agent during a session.
#[derive(Debug, Default)]
pub struct InsightMemo {
    insights: RwLock<Vec<String>>,
}

impl InsightMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an insight, returning the new insight count.
    pub async fn append(&self, insight: impl Into<String>) -> usize {
        let mut insights = self.insights.write().await;
        insights.push(insight.into());
        insights.len()
    }

    pub async fn len(&self) -> usize {
        self.insights.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.insights.read().await.is_empty()
    }

    /// Render the memo text.
    pub async fn synthesize(&self) -> String {
        let insights = self.insights.read().await;
        render_memo(&insights)
    }
}

fn render_memo(insights: &[String]) -> String {
    if insights.is_empty() {
        return "No data insights have been discovered yet.".to_string();
    }

    let bullets = insights
        .iter()
        .map(|insight| format!("- {insight}"))
        .collect::<Vec<_>>()
        .join("\n");

    let mut memo = format!("📊 Data Intelligence Memo 📊\n\nKey Insights Discovered:\n\n{bullets}");
    if insights.len() > 1 {
        memo.push_str(&format!(
            "\n\nSummary:\nAnalysis has revealed {} key data insights that suggest opportunities for strategic optimization and growth.",
            insights.len()
        ));
    }
    memo
}

//! Offline provider returning canned conversations.

use async_trait::async_trait;
use tracing::info;

use crate::error::LlmError;
use crate::llm::{Choice, GenerationRequest, GenerationResponse, LlmProvider, Message, Usage};

const SMALL_TALK: &str = r#"
{"speaker": "advisor", "text": "Good morning! How are you doing today?"}
{"speaker": "client", "text": "I'm doing well, thanks for asking. How about you?"}
{"speaker": "advisor", "text": "I'm great, thanks. Beautiful weather we're having, isn't it?"}
{"speaker": "client", "text": "Yes, it's lovely outside. Perfect for a walk later."}
"#;

const MARKET_COMMENTARY: &str = r#"
{"speaker": "advisor", "text": "Have you been following the recent market developments?"}
{"speaker": "client", "text": "Not closely. What's happening?"}
{"speaker": "advisor", "text": "There's been some volatility due to the Fed's recent announcements."}
{"speaker": "client", "text": "How might that affect my portfolio?"}
"#;

const PRODUCT_INQUIRY: &str = r#"
{"speaker": "advisor", "text": "What kinds of investment products are you interested in learning more about?"}
{"speaker": "client", "text": "I'm curious about alternatives to traditional stocks and bonds."}
{"speaker": "advisor", "text": "We offer several alternative investment options, including private equity, hedge funds, and real estate investment trusts."}
{"speaker": "client", "text": "Could you tell me more about the REITs? I've been thinking about real estate exposure."}
"#;

const BUSINESS_ADVISORY: &str = r#"
{"speaker": "advisor", "text": "Let's review your investment portfolio performance over the past quarter."}
{"speaker": "client", "text": "That would be great. I noticed some of my tech stocks have been down."}
{"speaker": "advisor", "text": "Yes, the tech sector has faced some headwinds recently, but your diversified approach has helped mitigate those losses."}
{"speaker": "client", "text": "That's good to hear. What adjustments would you recommend at this point?"}
"#;

const PERSONAL_CONCERNS: &str = r#"
{"speaker": "advisor", "text": "How's your family doing? Last time we spoke, your daughter was starting college."}
{"speaker": "client", "text": "Thanks for asking. She's doing well, but the tuition bills have been a bit of a shock."}
{"speaker": "advisor", "text": "I understand. Would you like to review your education funding strategy?"}
{"speaker": "client", "text": "Yes, I think we should look at whether I need to adjust my monthly contributions."}
"#;

const DEFAULT_CONVERSATION: &str = r#"
{"speaker": "advisor", "text": "Hello, how can I help you today?"}
{"speaker": "client", "text": "I'd like to discuss my investment strategy."}
{"speaker": "advisor", "text": "Of course. What specific aspects are you interested in reviewing?"}
{"speaker": "client", "text": "I'm wondering if I should rebalance my portfolio given recent market conditions."}
"#;

const DEFAULT_COMPANIES: [&str; 3] = ["Apple", "Microsoft", "Google"];

/// Provider that answers from a fixed set of conversations chosen by
/// keywords in the prompt. Never fails.
#[derive(Debug, Clone, Default)]
pub struct MockProvider;

impl MockProvider {
    pub fn new() -> Self {
        Self
    }

    /// The canned response for a prompt.
    pub fn respond(prompt: &str) -> String {
        let branches = [
            ("Small Talk", SMALL_TALK),
            ("Market Commentary", MARKET_COMMENTARY),
            ("Product & Service Inquiry", PRODUCT_INQUIRY),
            ("Business/Advisory", BUSINESS_ADVISORY),
            ("Client Personal Concerns", PERSONAL_CONCERNS),
        ];
        if let Some((_, canned)) = branches.iter().find(|(key, _)| prompt.contains(key)) {
            return canned.to_string();
        }

        if prompt.contains("company_targeting_enabled") || prompt.contains("prominently feature") {
            return company_conversation(&extract_companies(prompt));
        }

        DEFAULT_CONVERSATION.to_string()
    }
}

/// Company names listed on the first non-empty line after
/// "following companies:", with alias notes removed.
fn extract_companies(prompt: &str) -> Vec<String> {
    let mut names: Vec<String> = prompt
        .split_once("following companies:")
        .and_then(|(_, rest)| rest.lines().map(str::trim).find(|line| !line.is_empty()))
        .map(|line| {
            strip_parentheticals(line)
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    if names.is_empty() {
        names = DEFAULT_COMPANIES.iter().map(|s| s.to_string()).collect();
    }
    for fallback in DEFAULT_COMPANIES {
        if names.len() >= 2 {
            break;
        }
        if !names.iter().any(|n| n == fallback) {
            names.push(fallback.to_string());
        }
    }
    names
}

fn strip_parentheticals(line: &str) -> String {
    let mut depth = 0usize;
    line.chars()
        .filter(|c| match c {
            '(' => {
                depth += 1;
                false
            }
            ')' => {
                depth = depth.saturating_sub(1);
                false
            }
            _ => depth == 0,
        })
        .collect()
}

/// Ticker guess: the first four characters of the first word, uppercased.
fn pseudo_ticker(company: &str) -> String {
    company
        .split_whitespace()
        .next()
        .map(|word| word.chars().take(4).collect::<String>().to_uppercase())
        .unwrap_or_else(|| "TICK".to_string())
}

fn company_conversation(companies: &[String]) -> String {
    let c1 = companies.first().map(String::as_str).unwrap_or(DEFAULT_COMPANIES[0]);
    let c2 = companies.get(1).map(String::as_str).unwrap_or(DEFAULT_COMPANIES[1]);
    let ticker1 = pseudo_ticker(c1);

    [
        format!("Let's discuss the recent earnings report from {c1}. They've shown impressive growth this quarter."),
        format!("I've been following {c1} closely. What specific numbers stood out to you?"),
        format!("{c1} reported revenue growth of 15% year-over-year, exceeding analyst expectations by a significant margin."),
        format!("That's impressive. How does that compare to {c2}? I know they're in a similar space."),
        format!("While {c2} also had a strong quarter, they only saw about 8% growth. {c1} is clearly outperforming in the current market."),
        "What about their stock performance? Is now a good time to invest in either company?".to_string(),
        format!("{c1} stock ({ticker1}) is trading at a higher P/E ratio than {c2}, but I believe they have more room for growth in the long term."),
        format!("Thanks for the insights. I think I'll increase my position in {c1} based on this analysis."),
    ]
    .iter()
    .enumerate()
    .map(|(i, text)| {
        let speaker = if i % 2 == 0 { "advisor" } else { "client" };
        serde_json::json!({ "speaker": speaker, "text": text }).to_string()
    })
    .collect::<Vec<_>>()
    .join("\n")
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let prompt = request.prompt_text();
        let preview: String = prompt.chars().take(100).collect();
        info!(prompt_preview = %preview, "Generating mock content");

        let content = Self::respond(&prompt);
        let usage = Usage::estimate(&prompt, &content);

        Ok(GenerationResponse {
            id: format!("mock-{}", crate::utils::short_hex(12)),
            model: "mock".to_string(),
            choices: vec![Choice {
                index: 0,
                message: Message::assistant(content),
                finish_reason: "stop".to_string(),
            }],
            usage,
        })
    }
}

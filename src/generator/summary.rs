//! End-of-run statistics and report files.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::OutputError;

const HISTOGRAM_WIDTH: usize = 50;

/// Number of conversations keyed by how many companies they targeted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyBuckets {
    pub none: usize,
    pub one: usize,
    pub two: usize,
    pub three_or_more: usize,
}

impl CompanyBuckets {
    fn add(&mut self, key_companies: usize) {
        match key_companies {
            0 => self.none += 1,
            1 => self.one += 1,
            2 => self.two += 1,
            _ => self.three_or_more += 1,
        }
    }

    pub fn targeted(&self) -> usize {
        self.one + self.two + self.three_or_more
    }
}

/// Outcome of a generation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub output_dir: PathBuf,
    pub requested: usize,
    pub generated: usize,
    /// Conversations lost to LLM errors, empty parses or write failures.
    pub failed: usize,
    pub duplicates: usize,
    pub files: Vec<PathBuf>,
    pub company_buckets: CompanyBuckets,
    /// Conversations where at least one catalog company was detected.
    pub conversations_with_mentions: usize,
    /// How often each company was detected, across conversations.
    pub company_mention_counts: BTreeMap<String, usize>,
    /// Conversations per calendar day of their start timestamp.
    pub temporal_distribution: BTreeMap<NaiveDate, usize>,
    /// Conversation counts keyed by advisor, then client.
    pub interactions: BTreeMap<String, BTreeMap<String, usize>>,
}

impl RunSummary {
    pub fn new(run_id: impl Into<String>, output_dir: impl Into<PathBuf>, requested: usize) -> Self {
        Self {
            run_id: run_id.into(),
            output_dir: output_dir.into(),
            requested,
            ..Self::default()
        }
    }

    /// Records a conversation that made it into the output.
    pub fn record_conversation(
        &mut self,
        advisor: &str,
        client: &str,
        timestamp: NaiveDateTime,
        key_companies: usize,
        companies_found: &[String],
    ) {
        self.generated += 1;
        self.company_buckets.add(key_companies);
        if !companies_found.is_empty() {
            self.conversations_with_mentions += 1;
        }
        for company in companies_found {
            *self.company_mention_counts.entry(company.clone()).or_default() += 1;
        }
        *self.temporal_distribution.entry(timestamp.date()).or_default() += 1;
        *self
            .interactions
            .entry(advisor.to_string())
            .or_default()
            .entry(client.to_string())
            .or_default() += 1;
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    pub fn record_duplicate(&mut self) {
        self.duplicates += 1;
    }

    /// Share of targeted conversations where a company was actually detected.
    pub fn mention_success_rate(&self) -> f64 {
        let targeted = self.company_buckets.targeted();
        if targeted == 0 {
            return 0.0;
        }
        self.conversations_with_mentions as f64 / targeted as f64
    }

    /// Conversations per advisor, highest first.
    pub fn advisor_totals(&self) -> Vec<(&str, usize, usize)> {
        let mut totals: Vec<(&str, usize, usize)> = self
            .interactions
            .iter()
            .map(|(advisor, clients)| (advisor.as_str(), clients.values().sum(), clients.len()))
            .collect();
        totals.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        totals
    }

    /// Logs the headline numbers through `tracing`.
    pub fn log(&self) {
        info!(
            run_id = %self.run_id,
            requested = self.requested,
            generated = self.generated,
            failed = self.failed,
            duplicates = self.duplicates,
            files = self.files.len(),
            "Generation run finished"
        );

        let pairs: usize = self.interactions.values().map(BTreeMap::len).sum();
        info!(advisors = self.interactions.len(), pairs, "Advisor-client distribution");

        if self.company_buckets.targeted() > 0 {
            info!(
                targeted = self.company_buckets.targeted(),
                with_mentions = self.conversations_with_mentions,
                success_rate = format!("{:.1}%", self.mention_success_rate() * 100.0),
                "Company targeting"
            );
        }

        let mut weekdays: BTreeMap<u32, usize> = BTreeMap::new();
        for (date, count) in &self.temporal_distribution {
            *weekdays.entry(date.weekday().num_days_from_monday()).or_default() += count;
        }
        for (day, count) in weekdays {
            tracing::debug!(weekday = day, conversations = count, "Day of week distribution");
        }
    }

    /// Writes `run_summary_{run_id}.json` and
    /// `advisor_client_interactions_{run_id}.txt` into `dir`.
    pub fn write_report(&self, dir: &Path) -> Result<Vec<PathBuf>, OutputError> {
        fs::create_dir_all(dir)?;

        let summary_path = dir.join(format!("run_summary_{}.json", self.run_id));
        fs::write(&summary_path, serde_json::to_string_pretty(self)?)?;

        let interactions_path = dir.join(format!("advisor_client_interactions_{}.txt", self.run_id));
        fs::write(&interactions_path, self.interactions_report())?;

        info!(
            summary = %summary_path.display(),
            interactions = %interactions_path.display(),
            "Run report written"
        );
        Ok(vec![summary_path, interactions_path])
    }

    /// Plain-text breakdown of advisor/client interactions.
    pub fn interactions_report(&self) -> String {
        let mut out = String::new();
        let pairs: usize = self.interactions.values().map(BTreeMap::len).sum();
        let _ = writeln!(out, "===== ADVISOR-CLIENT INTERACTIONS =====");
        let _ = writeln!(out, "Total pairs: {pairs}\n");

        let totals = self.advisor_totals();
        let name_width = totals.iter().map(|(a, _, _)| a.len()).max().unwrap_or(0);
        let max_count = totals.first().map(|(_, c, _)| *c).unwrap_or(0);

        let _ = writeln!(out, "--- Advisor Activity Histogram ---");
        for (advisor, count, unique) in &totals {
            let bar_len = if max_count > 0 {
                count * HISTOGRAM_WIDTH / max_count
            } else {
                0
            };
            let pct = percentage(*count, self.requested);
            let _ = writeln!(
                out,
                "{advisor:<name_width$} | {} {count} ({pct:.1}%), {unique} clients",
                "█".repeat(bar_len)
            );
        }

        let mut advisors_by_client_count: BTreeMap<usize, usize> = BTreeMap::new();
        for (_, _, unique) in &totals {
            *advisors_by_client_count.entry(*unique).or_default() += 1;
        }
        let _ = writeln!(out, "\n--- Distribution of Advisors by Client Count ---");
        for (clients, advisors) in advisors_by_client_count {
            let _ = writeln!(out, "Advisors with {clients} clients: {advisors}");
        }

        let mut advisors_per_client: BTreeMap<&str, usize> = BTreeMap::new();
        for clients in self.interactions.values() {
            for client in clients.keys() {
                *advisors_per_client.entry(client.as_str()).or_default() += 1;
            }
        }
        let mut clients_by_advisor_count: BTreeMap<usize, usize> = BTreeMap::new();
        for count in advisors_per_client.values() {
            *clients_by_advisor_count.entry(*count).or_default() += 1;
        }
        let _ = writeln!(out, "\n--- Distribution of Clients by Advisor Count ---");
        for (advisors, clients) in clients_by_advisor_count {
            let _ = writeln!(out, "Clients with {advisors} advisors: {clients}");
        }

        let all_clients: BTreeSet<&str> = advisors_per_client.keys().copied().collect();
        let _ = writeln!(out, "\n--- Complete Interaction Matrix ---");
        let header: Vec<&str> = all_clients.iter().copied().collect();
        let _ = writeln!(out, "Advisor,{}", header.join(","));
        for (advisor, clients) in &self.interactions {
            let row: Vec<String> = all_clients
                .iter()
                .map(|c| clients.get(*c).copied().unwrap_or(0).to_string())
                .collect();
            let _ = writeln!(out, "{advisor},{}", row.join(","));
        }

        let _ = writeln!(out, "\n--- By Advisor ---");
        for (advisor, count, unique) in &totals {
            let _ = writeln!(out, "{advisor}: {count} conversations, {unique} unique clients");
            if let Some(clients) = self.interactions.get(*advisor) {
                for (client, n) in clients {
                    let _ = writeln!(out, "  - {client}: {n} conversations");
                }
            }
        }

        let mut pair_counts: Vec<(&str, &str, usize)> = self
            .interactions
            .iter()
            .flat_map(|(advisor, clients)| {
                clients
                    .iter()
                    .map(move |(client, n)| (advisor.as_str(), client.as_str(), *n))
            })
            .collect();
        pair_counts.sort_by(|a, b| b.2.cmp(&a.2));
        let _ = writeln!(out, "\n--- By Advisor-Client Pair ---");
        for (advisor, client, n) in pair_counts {
            let _ = writeln!(out, "{advisor} - {client}: {n}");
        }
        out
    }
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

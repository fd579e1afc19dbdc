//! DNS query resolution logic.
//!
//! Every question goes through the same pipeline:
//! 1. Drop AAAA questions
//! 2. Match the name against the rule set
//! 3. Answer matched A questions with the sentinel address, suppress other
//!    matched types, and forward everything else upstream
//!
//! Transports handle the I/O, the resolver handles decisions.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use hickory_proto::op::{Message, Query};
use hickory_proto::rr::{Record, RecordType};
use tracing::{debug, warn};

use crate::dns;
use crate::filter::RuleSet;
use crate::stats::{Stats, StatsSnapshot};
use crate::upstream::Upstream;

/// Default sentinel handed out for intercepted names.
pub const DEFAULT_SENTINEL: Ipv4Addr = Ipv4Addr::new(8, 8, 8, 255);

/// Switches for the record-type gating rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    /// Drop AAAA questions without answering or forwarding.
    pub drop_aaaa: bool,
    /// Answer nothing for non-A questions on matched names instead of
    /// forwarding them.
    pub suppress_matched_non_a: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            drop_aaaa: true,
            suppress_matched_non_a: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Aaaa,
    MatchedNonA,
}

/// Action to take for a single question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryAction {
    /// Answer locally with the sentinel address.
    Intercept,
    /// Relay to the upstream resolver.
    Forward,
    /// Answer nothing for this question.
    Drop(DropReason),
}

/// Resolver handles per-question decisions and executes them.
///
/// Holds the rule set for the lifetime of the process; it is never mutated
/// after construction and is shared across request tasks through an `Arc`.
pub struct Resolver {
    rules: RuleSet,
    upstream: Arc<dyn Upstream>,
    sentinel: Ipv4Addr,
    policy: Policy,
    stats: Stats,
}

impl Resolver {
    pub fn new(rules: RuleSet, upstream: Arc<dyn Upstream>, sentinel: Ipv4Addr) -> Self {
        Self {
            rules,
            upstream,
            sentinel,
            policy: Policy::default(),
            stats: Stats::new(),
        }
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    /// Decide what to do with a question for `domain` (no trailing dot).
    pub fn decide(&self, domain: &str, record_type: RecordType) -> QueryAction {
        if record_type == RecordType::AAAA && self.policy.drop_aaaa {
            return QueryAction::Drop(DropReason::Aaaa);
        }

        if !self.rules.matches(domain) {
            return QueryAction::Forward;
        }

        if record_type == RecordType::A {
            QueryAction::Intercept
        } else if self.policy.suppress_matched_non_a {
            QueryAction::Drop(DropReason::MatchedNonA)
        } else {
            QueryAction::Forward
        }
    }

    /// Resolve one question into its answer records.
    ///
    /// Never fails: upstream errors yield an empty answer set.
    pub async fn resolve(&self, query: &Query) -> Vec<Record> {
        let name = query.name();
        let record_type = query.query_type();
        let domain = dns::normalize(name);

        match self.decide(&domain, record_type) {
            QueryAction::Intercept => {
                self.stats.record_intercepted();
                debug!(%domain, %record_type, sentinel = %self.sentinel, "intercepted");
                vec![dns::sentinel_record(name.clone(), self.sentinel)]
            }
            QueryAction::Drop(reason) => {
                self.stats.record_dropped();
                debug!(%domain, %record_type, ?reason, "dropped");
                Vec::new()
            }
            QueryAction::Forward => self.forward(&domain, query).await,
        }
    }

    async fn forward(&self, domain: &str, query: &Query) -> Vec<Record> {
        let start = Instant::now();
        let request = dns::forward_query(query.name().clone(), query.query_type());
        let result = self.upstream.exchange(request).await;
        let upstream_ms = start.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(mut response) => {
                self.stats.record_forwarded(upstream_ms, true);
                let answers = response.take_answers();
                debug!(
                    %domain,
                    record_type = %query.query_type(),
                    answers = answers.len(),
                    upstream_ms,
                    "forwarded"
                );
                answers
            }
            Err(e) => {
                self.stats.record_forwarded(upstream_ms, false);
                if e.is_upstream() {
                    debug!(%domain, record_type = %query.query_type(), error = %e, "forward failed");
                } else {
                    warn!(%domain, record_type = %query.query_type(), error = %e, "forward failed");
                }
                Vec::new()
            }
        }
    }

    /// Build the reply for a whole request.
    ///
    /// Questions are resolved independently and their answers are
    /// concatenated in question order.
    pub async fn answer(&self, request: &Message) -> Message {
        let answers = join_all(request.queries().iter().map(|q| self.resolve(q))).await;

        let mut reply = dns::reply_to(request);
        reply.add_answers(answers.into_iter().flatten());
        reply
    }

    /// Returns the number of patterns in the rule set.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn sentinel(&self) -> Ipv4Addr {
        self.sentinel
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn stats_snapshot_and_reset(&self) -> StatsSnapshot {
        self.stats.snapshot_and_reset()
    }
}

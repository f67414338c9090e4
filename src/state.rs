//! Application state: in-memory stores and the solo-attempt orchestration.
//!
//! This module owns:
//!   - the question catalog (config bank merged over built-in seeds)
//!   - per-user answered-question banks, quota records, and point balances
//!   - the lobby store
//!
//! The fetch path is guard -> select -> commit: quota counts are committed
//! only after selection succeeds, so a failed fetch never burns quota. The
//! guard runs twice, once before selection as a fast fail and again inside
//! the commit critical section, so concurrent fetches by one user cannot
//! race past the caps.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::config::{load_config_from_env, AppConfig};
use crate::domain::{Quota, Question};
use crate::error::ApiError;
use crate::lobby::LobbyStore;
use crate::protocol::{
    groups_out, AttemptMeta, QuestionSetRequest, QuestionSetResponse, SubmitAttemptRequest,
    SubmitAttemptResponse,
};
use crate::scoring::{score, ResolvedAnswer};
use crate::seeds::seed_questions;
use crate::selector::select;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<RwLock<HashMap<String, Question>>>,
    pub qbanks: Arc<RwLock<HashMap<String, HashSet<String>>>>,
    pub quotas: Arc<RwLock<HashMap<String, Quota>>>,
    pub balances: Arc<RwLock<HashMap<String, f64>>>,
    pub lobby: LobbyStore,
    pub config: AppConfig,
}

impl AppState {
    /// Build state from env: load TOML config, merge the question bank over
    /// the built-in seeds, log the inventory.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        Self::from_config(load_config_from_env().unwrap_or_default())
    }

    pub fn from_config(config: AppConfig) -> Self {
        let mut catalog = HashMap::<String, Question>::new();

        for cfg in config.questions.clone() {
            match cfg.into_question() {
                Some(q) => {
                    catalog.insert(q.id.clone(), q);
                }
                None => {
                    tracing::error!(target: "quiz", "Skipping bank item: no correct option.");
                }
            }
        }

        // Built-in seeds never overwrite bank entries.
        for q in seed_questions() {
            catalog.entry(q.id.clone()).or_insert(q);
        }

        let mut count_by_subject: HashMap<&str, usize> = HashMap::new();
        for q in catalog.values() {
            *count_by_subject.entry(q.subject_id.as_str()).or_default() += 1;
        }
        for (subject, count) in count_by_subject {
            info!(target: "quiz", %subject, count, "Startup question inventory");
        }

        Self {
            catalog: Arc::new(RwLock::new(catalog)),
            qbanks: Arc::new(RwLock::new(HashMap::new())),
            quotas: Arc::new(RwLock::new(HashMap::new())),
            balances: Arc::new(RwLock::new(HashMap::new())),
            lobby: LobbyStore::new(),
            config,
        }
    }

    /// Issue a question set: quota guard, fresh-first selection, then quota
    /// commit. In `friends` mode the requester is the host and the only
    /// participant whose quota is checked or charged.
    #[instrument(level = "info", skip(self, req), fields(user_id = %req.user_id, category_id = %req.category_id, ?req.mode))]
    pub async fn fetch_question_set(
        &self,
        req: QuestionSetRequest,
    ) -> Result<QuestionSetResponse, ApiError> {
        if req.subjects.is_empty() || req.subjects.len() > 2 {
            return Err(ApiError::Validation(
                "between 1 and 2 subjects are required".into(),
            ));
        }
        let mut subject_ids: Vec<String> = Vec::with_capacity(req.subjects.len());
        for s in &req.subjects {
            if s.id.is_empty() {
                return Err(ApiError::Validation("subject _id must not be empty".into()));
            }
            if subject_ids.contains(&s.id) {
                return Err(ApiError::Validation(format!(
                    "duplicate subject '{}'",
                    s.id
                )));
            }
            subject_ids.push(s.id.clone());
        }

        let catalog: Vec<Question> = {
            let catalog = self.catalog.read().await;
            if !catalog
                .values()
                .any(|q| q.category_ids.iter().any(|c| c == &req.category_id))
            {
                return Err(ApiError::NotFound(format!(
                    "unknown category '{}'",
                    req.category_id
                )));
            }
            for subject_id in &subject_ids {
                if !catalog.values().any(|q| &q.subject_id == subject_id) {
                    return Err(ApiError::NotFound(format!(
                        "unknown subject '{}'",
                        subject_id
                    )));
                }
            }
            catalog.values().cloned().collect()
        };

        let now = Utc::now();
        let set_size = self.config.limits.set_size;
        // Fast fail before the selection work; the authoritative check is
        // repeated under the commit write lock below.
        {
            let quotas = self.quotas.read().await;
            crate::quota::evaluate(
                quotas.get(&req.user_id),
                &subject_ids,
                set_size,
                &self.config.limits,
                self.config.quota.window,
                now,
            )?;
        }

        let qbank = {
            let qbanks = self.qbanks.read().await;
            qbanks.get(&req.user_id).cloned().unwrap_or_default()
        };

        let (groups, stats) = select(
            &catalog,
            &req.category_id,
            &req.subjects,
            &qbank,
            set_size as usize,
            &mut rand::thread_rng(),
        )?;

        {
            let mut quotas = self.quotas.write().await;
            // Re-check against the current record: another fetch may have
            // committed while selection ran.
            crate::quota::evaluate(
                quotas.get(&req.user_id),
                &subject_ids,
                set_size,
                &self.config.limits,
                self.config.quota.window,
                now,
            )?;
            let next = crate::quota::commit(
                quotas.get(&req.user_id),
                &subject_ids,
                set_size,
                self.config.quota.window,
                now,
            );
            info!(
                target: "quiz",
                user_id = %req.user_id,
                daily_count = next.daily_questions_count,
                "quota committed after fetch"
            );
            quotas.insert(req.user_id.clone(), next);
        }

        Ok(QuestionSetResponse {
            groups: groups_out(&groups),
            meta: AttemptMeta { stats },
        })
    }

    /// Score a completed attempt and commit its postconditions in order:
    /// bank union, weekly points, balance. Each step is logged; a failure in
    /// any step would be reported, never swallowed.
    #[instrument(level = "info", skip(self, req), fields(user_id = %req.user_id, answers = req.answers.len()))]
    pub async fn submit_attempt(
        &self,
        req: SubmitAttemptRequest,
    ) -> Result<SubmitAttemptResponse, ApiError> {
        if req.answers.is_empty() {
            return Err(ApiError::Validation("no answers submitted".into()));
        }

        // Correctness is resolved server-side against the catalog. Duplicate
        // question ids are rejected; each would score as fresh against the
        // same bank snapshot and collect full credit more than once.
        let resolved: Vec<ResolvedAnswer> = {
            let catalog = self.catalog.read().await;
            let mut seen = HashSet::with_capacity(req.answers.len());
            let mut out = Vec::with_capacity(req.answers.len());
            for a in &req.answers {
                if !seen.insert(a.question_id.as_str()) {
                    return Err(ApiError::Validation(format!(
                        "duplicate answer for question '{}'",
                        a.question_id
                    )));
                }
                let q = catalog.get(&a.question_id).ok_or_else(|| {
                    ApiError::NotFound(format!("unknown question '{}'", a.question_id))
                })?;
                let option = q.options.get(a.option).ok_or_else(|| {
                    ApiError::Validation(format!(
                        "question '{}' has no option {}",
                        a.question_id, a.option
                    ))
                })?;
                out.push(ResolvedAnswer {
                    question_id: a.question_id.clone(),
                    points: q.points,
                    correct: option.correct,
                });
            }
            out
        };

        let qbank_snapshot = {
            let qbanks = self.qbanks.read().await;
            qbanks.get(&req.user_id).cloned().unwrap_or_default()
        };

        let outcome = score(
            &resolved,
            &qbank_snapshot,
            self.config.economy.fail_penalty,
            self.config.economy.repeat_reward,
        );

        // 1) Union both id lists into the bank.
        {
            let mut qbanks = self.qbanks.write().await;
            let bank = qbanks.entry(req.user_id.clone()).or_default();
            bank.extend(outcome.new_question_ids.iter().cloned());
            bank.extend(outcome.repeated_question_ids.iter().cloned());
            info!(target: "quiz", user_id = %req.user_id, bank_size = bank.len(), "qbank updated");
        }

        // 2) Roll the weekly points window.
        let point_per_week = {
            let now = Utc::now();
            let mut quotas = self.quotas.write().await;
            let quota = quotas.entry(req.user_id.clone()).or_insert_with(|| Quota {
                daily_update: now,
                daily_questions_count: 0,
                daily_subjects: Vec::new(),
                weekly_update: now,
                point_per_week: 0.0,
            });
            if now - quota.weekly_update >= Duration::days(7) {
                quota.weekly_update = now;
                quota.point_per_week = outcome.total_points;
            } else {
                quota.point_per_week += outcome.total_points;
            }
            quota.point_per_week
        };

        // 3) Credit the balance.
        let balance = {
            let mut balances = self.balances.write().await;
            let balance = balances.entry(req.user_id.clone()).or_default();
            *balance += outcome.total_points;
            *balance
        };
        info!(
            target: "quiz",
            user_id = %req.user_id,
            points = outcome.total_points,
            balance,
            "attempt scored"
        );

        Ok(SubmitAttemptResponse {
            outcome,
            balance,
            point_per_week,
        })
    }
}

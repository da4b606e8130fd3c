//! Two-phase filter chain deciding which entries reach the rolling sink.

use std::sync::Arc;

use tracing::error;

use crate::emitter;
use crate::event::TraceEvent;

/// Outcome of one filter rule.
///
/// `Accept` and `Deny` are final for the event; `Neutral` defers to the next
/// rule in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Deny,
    Neutral,
}

/// A pluggable decision rule evaluated against the formatted message text.
pub trait FilterRule: Send + Sync {
    /// Identity used in diagnostics when the rule fails.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn decide(&self, message: &str) -> Result<Verdict, String>;
}

/// Ordered chain of rules fronted by the built-in origin gate.
///
/// The gate runs first and denies every entry whose origin is some call site
/// other than the internal emitter; entries with no origin at all pass
/// through to the custom rules. Custom rules run in insertion order over the
/// formatted message; the first `Accept` or `Deny` wins, a rule error counts
/// as `Deny`, and a chain where every rule abstains accepts the entry.
pub struct FilterChain {
    rules: Vec<Arc<dyn FilterRule>>,
}

impl FilterChain {
    pub fn new(rules: Vec<Arc<dyn FilterRule>>) -> Self {
        Self { rules }
    }

    /// Decide whether `event` is written. Returns only `Accept` or `Deny`.
    pub fn decide(&self, event: &TraceEvent) -> Verdict {
        if origin_gate(event) == Verdict::Deny {
            return Verdict::Deny;
        }

        let message = event.formatted();
        for rule in &self.rules {
            match rule.decide(&message) {
                Ok(Verdict::Neutral) => continue,
                Ok(verdict) => return verdict,
                Err(err) => {
                    error!(
                        rule = rule.name(),
                        message = %message,
                        error = %err,
                        "filter rule evaluation failed, entry denied"
                    );
                    return Verdict::Deny;
                }
            }
        }

        Verdict::Accept
    }
}

/// Built-in gate over the entry's origin tag. Only the internal emitter (or
/// an entry with no origin information at all) may proceed to the custom
/// rules; any other call site is denied outright.
fn origin_gate(event: &TraceEvent) -> Verdict {
    match event.origin.as_deref() {
        None => Verdict::Neutral,
        Some(origin) if origin == emitter::ORIGIN => Verdict::Neutral,
        Some(_) => Verdict::Deny,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tracing::Level;
    use tracing_test::traced_test;

    use super::*;

    struct Fixed {
        label: &'static str,
        verdict: Verdict,
        calls: Arc<AtomicUsize>,
    }

    impl Fixed {
        fn rule(label: &'static str, verdict: Verdict) -> (Arc<dyn FilterRule>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let rule: Arc<dyn FilterRule> = Arc::new(Fixed {
                label,
                verdict,
                calls: calls.clone(),
            });
            (rule, calls)
        }
    }

    impl FilterRule for Fixed {
        fn name(&self) -> &str {
            self.label
        }

        fn decide(&self, _message: &str) -> Result<Verdict, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.verdict)
        }
    }

    struct Exploding;

    impl FilterRule for Exploding {
        fn name(&self) -> &str {
            "exploding"
        }

        fn decide(&self, message: &str) -> Result<Verdict, String> {
            Err(format!("refused to evaluate '{}'", message))
        }
    }

    fn internal_event(message: &str) -> TraceEvent {
        TraceEvent::new(Level::INFO, "chain", message.to_string()).with_origin(emitter::ORIGIN)
    }

    #[test]
    fn all_neutral_rules_accept() {
        let (a, _) = Fixed::rule("a", Verdict::Neutral);
        let (b, _) = Fixed::rule("b", Verdict::Neutral);
        let chain = FilterChain::new(vec![a, b]);

        assert_eq!(chain.decide(&internal_event("ok")), Verdict::Accept);
    }

    #[test]
    fn empty_chain_accepts() {
        let chain = FilterChain::new(vec![]);
        assert_eq!(chain.decide(&internal_event("ok")), Verdict::Accept);
    }

    #[test]
    fn deny_short_circuits_later_rules() {
        let (a, _) = Fixed::rule("a", Verdict::Neutral);
        let (b, _) = Fixed::rule("b", Verdict::Deny);
        let (c, c_calls) = Fixed::rule("c", Verdict::Accept);
        let chain = FilterChain::new(vec![a, b, c]);

        assert_eq!(chain.decide(&internal_event("drop me")), Verdict::Deny);
        assert_eq!(c_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn accept_short_circuits_later_rules() {
        let (a, _) = Fixed::rule("a", Verdict::Accept);
        let (b, b_calls) = Fixed::rule("b", Verdict::Deny);
        let chain = FilterChain::new(vec![a, b]);

        assert_eq!(chain.decide(&internal_event("keep me")), Verdict::Accept);
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn foreign_origin_is_denied_before_custom_rules_run() {
        let (a, a_calls) = Fixed::rule("a", Verdict::Accept);
        let chain = FilterChain::new(vec![a]);

        let event = TraceEvent::new(Level::INFO, "chain", "smuggled".to_string())
            .with_origin("app::handlers");

        assert_eq!(chain.decide(&event), Verdict::Deny);
        assert_eq!(a_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn absent_origin_passes_the_gate() {
        let chain = FilterChain::new(vec![]);
        let event = TraceEvent::new(Level::INFO, "chain", "no origin".to_string());

        assert_eq!(chain.decide(&event), Verdict::Accept);
    }

    #[traced_test]
    #[test]
    fn erroring_rule_fails_closed_with_one_diagnostic() {
        let (after, after_calls) = Fixed::rule("after", Verdict::Accept);
        let chain = FilterChain::new(vec![Arc::new(Exploding), after]);

        let verdict = chain.decide(&internal_event("corrupted payload"));

        assert_eq!(verdict, Verdict::Deny);
        assert_eq!(after_calls.load(Ordering::SeqCst), 0);
        assert!(logs_contain("exploding"));
        assert!(logs_contain("corrupted payload"));
        logs_assert(|lines: &[&str]| {
            match lines
                .iter()
                .filter(|line| line.contains("corrupted payload"))
                .count()
            {
                1 => Ok(()),
                n => Err(format!("expected one diagnostic, found {}", n)),
            }
        });
    }
}

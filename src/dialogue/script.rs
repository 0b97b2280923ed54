//! Scripts: the delayed output of one dialogue turn.
//!
//! The orchestrator never sleeps. It returns a [`Script`] and the session
//! runtime executes the steps in order, waiting each step's delay first.

use std::time::Duration;

use crate::chat::model::Card;

/// What a step does when its delay elapses.
#[derive(Debug, Clone, PartialEq)]
pub enum StepAction {
    /// Append a bot message.
    Say(Card),
    /// Tell the presentation layer to navigate (sign-in handoff).
    Redirect {
        path: String,
        user_hint: Option<String>,
    },
    /// Load the bill PDF and report the outcome in the chat.
    DeliverDocument { ban: Option<String> },
}

/// One scheduled step. `delay` is relative to the previous step.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptStep {
    pub delay: Duration,
    pub action: StepAction,
}

/// Ordered steps produced by one turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    steps: Vec<ScriptStep>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message right after the previous step.
    pub fn say(self, card: Card) -> Self {
        self.say_after(Duration::ZERO, card)
    }

    /// Append a message `delay` after the previous step.
    pub fn say_after(self, delay: Duration, card: Card) -> Self {
        self.then(delay, StepAction::Say(card))
    }

    /// Append any step.
    pub fn then(mut self, delay: Duration, action: StepAction) -> Self {
        self.steps.push(ScriptStep { delay, action });
        self
    }

    /// Append every step of `other`.
    pub fn extend(mut self, other: Script) -> Self {
        self.steps.extend(other.steps);
        self
    }

    /// Add `delay` in front of the first step.
    pub fn delayed(mut self, delay: Duration) -> Self {
        if let Some(first) = self.steps.first_mut() {
            first.delay += delay;
        }
        self
    }

    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Sum of every step delay.
    pub fn total_delay(&self) -> Duration {
        self.steps.iter().map(|s| s.delay).sum()
    }

    /// Cards this script will say, in order.
    pub fn cards(&self) -> impl Iterator<Item = &Card> {
        self.steps.iter().filter_map(|s| match &s.action {
            StepAction::Say(card) => Some(card),
            _ => None,
        })
    }
}

impl IntoIterator for Script {
    type Item = ScriptStep;
    type IntoIter = std::vec::IntoIter<ScriptStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_are_relative_and_summed() {
        let script = Script::new()
            .say(Card::text("one"))
            .say_after(Duration::from_millis(1000), Card::text("two"))
            .delayed(Duration::from_millis(500));

        assert_eq!(script.len(), 2);
        assert_eq!(script.steps()[0].delay, Duration::from_millis(500));
        assert_eq!(script.steps()[1].delay, Duration::from_millis(1000));
        assert_eq!(script.total_delay(), Duration::from_millis(1500));
    }

    #[test]
    fn cards_skip_non_message_steps() {
        let script = Script::new()
            .say(Card::text("redirecting"))
            .then(
                Duration::ZERO,
                StepAction::Redirect {
                    path: "/login".into(),
                    user_hint: None,
                },
            );
        assert_eq!(script.cards().count(), 1);
    }

    #[test]
    fn delaying_empty_script_is_noop() {
        let script = Script::new().delayed(Duration::from_secs(1));
        assert!(script.is_empty());
        assert_eq!(script.total_delay(), Duration::ZERO);
    }

    #[test]
    fn extend_keeps_order() {
        let a = Script::new().say(Card::text("a"));
        let b = Script::new().say(Card::text("b"));
        let merged = a.extend(b);
        let texts: Vec<_> = merged.cards().filter_map(|c| c.body()).collect();
        assert_eq!(texts, vec!["a", "b"]);
    }
}

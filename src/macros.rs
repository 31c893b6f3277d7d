#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).unwrap());
        &*RE
    }};
}

/// Predicate matching segment values against a regex literal.
#[macro_export]
macro_rules! re {
    ($pat:literal) => {
        $crate::Predicate::ValueRegex($crate::regex!($pat))
    };
}

/// Predicate from a plain function or non-capturing closure over a segment.
#[macro_export]
macro_rules! pred {
    ($p:expr) => {
        $crate::Predicate::Custom($p)
    };
}

/// Declare a [`RuleConfig`](crate::RuleConfig).
///
/// ```text
/// rule! {
///     layer: "underlying",
///     trigger: Predicate::vowel(),
///     where: Condition::word_final(),          // optional
///     action: Action::Transform,
///     into: [Segment::vowel("aa")],            // or weighted: [(outcome, 2.0), ...]
///     because: "final lengthening",
/// }
/// ```
#[macro_export]
macro_rules! rule {
    (
        layer: $layer:expr,
        trigger: $trigger:expr,
        $(where: $cond:expr,)?
        action: $action:expr,
        into: [ $($into:expr),* $(,)? ],
        because: $reason:expr
        $(,)?
    ) => {{
        $crate::RuleConfig {
            layer: ::std::string::String::from($layer),
            trigger: $trigger,
            condition: { None::<$crate::Condition> $(.or(Some($cond)))? },
            action: $action,
            outcomes: $crate::OutcomeSpec::List(vec![ $($crate::Outcome::from($into)),* ]),
            reason: ::std::string::String::from($reason),
        }
    }};
    (
        layer: $layer:expr,
        trigger: $trigger:expr,
        $(where: $cond:expr,)?
        action: $action:expr,
        weighted: [ $(($into:expr, $weight:expr)),* $(,)? ],
        because: $reason:expr
        $(,)?
    ) => {{
        $crate::RuleConfig {
            layer: ::std::string::String::from($layer),
            trigger: $trigger,
            condition: { None::<$crate::Condition> $(.or(Some($cond)))? },
            action: $action,
            outcomes: $crate::OutcomeSpec::Weighted(vec![ $(($crate::Outcome::from($into), $weight as f64)),* ]),
            reason: ::std::string::String::from($reason),
        }
    }};
}

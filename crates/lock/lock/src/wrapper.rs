//! Declarative locking around arbitrary async operations.
//!
//! A [`Locked`] operation pairs a [`LockSpec`] (key template, lease, optional
//! retry policy) with an async function. Each call resolves the key template
//! against the call's positional arguments and runs the function inside
//! [`DistributedLockService::with_lock_retry`], so every safety guarantee
//! comes from the service.
//!
//! ```ignore
//! let provision = locked(
//!     LockSpec::new("device:{0}:provision", Duration::from_secs(30))?,
//!     |(device_id, user_id): (u64, String)| async move {
//!         provision_device(device_id, &user_id).await
//!     },
//! );
//!
//! provision.call(&devices_service, (456, "user-1".to_owned())).await?;
//! ```

use std::borrow::Cow;
use std::fmt::{self, Display};
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RetryPolicy;
use crate::error::LockError;
use crate::service::DistributedLockService;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Arg(usize),
}

/// Lock key pattern with positional placeholders.
///
/// `{N}` is replaced by the `N`-th argument of the call; `{{` and `}}` are
/// literal braces. For example `device:{0}:owner:{1}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl KeyTemplate {
    /// Parse a key template.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Configuration`] for unbalanced braces or
    /// placeholders that are not a non-negative integer.
    pub fn parse(template: &str) -> Result<Self, LockError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '{' => {
                    let mut index = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(d) => index.push(d),
                            None => {
                                return Err(template_error(template, "unclosed placeholder"));
                            }
                        }
                    }
                    let index = index.trim().parse::<usize>().map_err(|_| {
                        template_error(
                            template,
                            &format!("placeholder '{{{index}}}' is not an argument index"),
                        )
                    })?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Arg(index));
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(template_error(template, "unmatched '}'")),
                c => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        if segments.is_empty() {
            return Err(template_error(template, "lock key is empty"));
        }

        Ok(Self {
            raw: template.to_owned(),
            segments,
        })
    }

    /// Substitute positional arguments into the template.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Configuration`] if a placeholder refers to an
    /// argument that was not supplied.
    pub fn resolve(&self, args: &[String]) -> Result<String, LockError> {
        let needed = self.arity();
        if args.len() < needed {
            return Err(template_error(
                &self.raw,
                &format!("needs {needed} arguments, {} supplied", args.len()),
            ));
        }

        let mut key = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => key.push_str(s),
                Segment::Arg(i) => key.push_str(&args[*i]),
            }
        }
        Ok(key)
    }

    /// The template as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Number of positional arguments the template needs.
    pub fn arity(&self) -> usize {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Arg(i) => Some(i + 1),
                Segment::Literal(_) => None,
            })
            .max()
            .unwrap_or(0)
    }
}

fn template_error(template: &str, reason: &str) -> LockError {
    LockError::Configuration(format!("invalid lock key template '{template}': {reason}"))
}

impl FromStr for KeyTemplate {
    type Err = LockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for KeyTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Lock configuration for a declaratively locked operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockSpec {
    /// Key template resolved against the call's arguments.
    pub key: KeyTemplate,
    /// Lease to acquire the lock with.
    pub lease: Duration,
    /// Retry policy. `None` uses the service's configured default.
    pub retry: Option<RetryPolicy>,
}

impl LockSpec {
    /// Create a spec from a key template string and lease.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Configuration`] if the template is malformed.
    pub fn new(key: &str, lease: Duration) -> Result<Self, LockError> {
        Ok(Self {
            key: KeyTemplate::parse(key)?,
            lease,
            retry: None,
        })
    }

    /// Override the retry policy.
    #[must_use]
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }
}

/// Arguments of a locked operation, rendered positionally for key templates.
pub trait LockArgs {
    /// Render each argument as a string, in positional order.
    fn lock_args(&self) -> Vec<String>;
}

impl LockArgs for () {
    fn lock_args(&self) -> Vec<String> {
        Vec::new()
    }
}

impl LockArgs for [String] {
    fn lock_args(&self) -> Vec<String> {
        self.to_vec()
    }
}

impl LockArgs for Vec<String> {
    fn lock_args(&self) -> Vec<String> {
        self.clone()
    }
}

impl<T: LockArgs + ?Sized> LockArgs for &T {
    fn lock_args(&self) -> Vec<String> {
        (**self).lock_args()
    }
}

macro_rules! impl_lock_args_for_tuple {
    ($($idx:tt : $name:ident),+) => {
        impl<$($name: Display),+> LockArgs for ($($name,)+) {
            fn lock_args(&self) -> Vec<String> {
                vec![$(self.$idx.to_string()),+]
            }
        }
    };
}

impl_lock_args_for_tuple!(0: A);
impl_lock_args_for_tuple!(0: A, 1: B);
impl_lock_args_for_tuple!(0: A, 1: B, 2: C);
impl_lock_args_for_tuple!(0: A, 1: B, 2: C, 3: D);

/// A collaborator that may carry a lock service.
///
/// Locked operations look the service up at call time and fail with a
/// configuration error when none is available.
pub trait LockProvider {
    /// The lock service to use, if any.
    fn lock_service(&self) -> Option<&DistributedLockService>;
}

impl LockProvider for DistributedLockService {
    fn lock_service(&self) -> Option<&DistributedLockService> {
        Some(self)
    }
}

impl<P: LockProvider + ?Sized> LockProvider for Arc<P> {
    fn lock_service(&self) -> Option<&DistributedLockService> {
        (**self).lock_service()
    }
}

impl<P: LockProvider> LockProvider for Option<P> {
    fn lock_service(&self) -> Option<&DistributedLockService> {
        self.as_ref().and_then(LockProvider::lock_service)
    }
}

type SpecFn = dyn Fn(&[String]) -> Result<LockSpec, LockError> + Send + Sync;

enum SpecSource {
    Static(LockSpec),
    PerCall(Box<SpecFn>),
}

/// An async operation that always runs under a distributed lock.
pub struct Locked<F> {
    spec: SpecSource,
    op: F,
}

/// Wrap `op` so every call runs under a lock described by `spec`.
pub fn locked<F>(spec: LockSpec, op: F) -> Locked<F> {
    Locked {
        spec: SpecSource::Static(spec),
        op,
    }
}

/// Wrap `op` with a lock spec computed per call from the rendered arguments.
pub fn locked_with<S, F>(spec_fn: S, op: F) -> Locked<F>
where
    S: Fn(&[String]) -> Result<LockSpec, LockError> + Send + Sync + 'static,
{
    Locked {
        spec: SpecSource::PerCall(Box::new(spec_fn)),
        op,
    }
}

impl<F> Locked<F> {
    /// Resolve the lock key for `args`, then run the operation inside
    /// [`DistributedLockService::with_lock_retry`].
    ///
    /// # Errors
    ///
    /// - [`LockError::Configuration`] if `provider` has no lock service or
    ///   the key cannot be resolved. The operation is not invoked.
    /// - Acquisition errors from the service, converted into `E`.
    /// - Whatever the operation itself returns.
    pub async fn call<P, A, Fut, T, E>(&self, provider: &P, args: A) -> Result<T, E>
    where
        P: LockProvider + ?Sized,
        A: LockArgs,
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LockError>,
    {
        let Some(service) = provider.lock_service() else {
            return Err(LockError::Configuration(
                "locked operation called without a distributed lock service".to_owned(),
            )
            .into());
        };

        let positional = args.lock_args();
        let spec = match &self.spec {
            SpecSource::Static(spec) => Cow::Borrowed(spec),
            SpecSource::PerCall(spec_fn) => Cow::Owned(spec_fn(&positional)?),
        };
        let key = spec.key.resolve(&positional)?;
        let policy = spec
            .retry
            .unwrap_or_else(|| service.config().retry_policy());

        service
            .with_lock_retry(&key, spec.lease, policy, || (self.op)(args))
            .await
    }
}

impl<F> fmt::Debug for Locked<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Locked");
        match &self.spec {
            SpecSource::Static(spec) => s.field("spec", spec),
            SpecSource::PerCall(_) => s.field("spec", &"<per-call>"),
        };
        s.finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_owned()).collect()
    }

    #[test]
    fn resolves_positional_placeholders() {
        let tpl = KeyTemplate::parse("device:{0}:owner:{1}").unwrap();
        assert_eq!(tpl.arity(), 2);
        assert_eq!(
            tpl.resolve(&args(&["456", "user-1"])).unwrap(),
            "device:456:owner:user-1"
        );
    }

    #[test]
    fn placeholders_may_repeat_and_reorder() {
        let tpl = KeyTemplate::parse("{1}-{0}-{1}").unwrap();
        assert_eq!(tpl.resolve(&args(&["a", "b"])).unwrap(), "b-a-b");
    }

    #[test]
    fn static_key_needs_no_arguments() {
        let tpl = KeyTemplate::parse("billing:daily-close").unwrap();
        assert_eq!(tpl.arity(), 0);
        assert_eq!(tpl.resolve(&[]).unwrap(), "billing:daily-close");
    }

    #[test]
    fn escaped_braces_are_literal() {
        let tpl = KeyTemplate::parse("set:{{{0}}}").unwrap();
        assert_eq!(tpl.resolve(&args(&["x"])).unwrap(), "set:{x}");
    }

    #[test]
    fn missing_argument_is_configuration_error() {
        let tpl = KeyTemplate::parse("user:{0}:login:{2}").unwrap();
        let err = tpl.resolve(&args(&["123"])).unwrap_err();
        assert!(matches!(err, LockError::Configuration(_)));
        assert!(err.to_string().contains("needs 3 arguments, 1 supplied"));
    }

    #[test]
    fn malformed_templates_are_rejected() {
        for bad in ["user:{0", "user:{name}", "user:}", "", "{}"] {
            let err = KeyTemplate::parse(bad).unwrap_err();
            assert!(
                matches!(err, LockError::Configuration(_)),
                "template {bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn template_parses_via_from_str() {
        let tpl: KeyTemplate = "order:{0}".parse().unwrap();
        assert_eq!(tpl.to_string(), "order:{0}");
    }

    #[test]
    fn tuple_args_render_in_order() {
        assert_eq!((42_u32,).lock_args(), args(&["42"]));
        assert_eq!((1, "two", 3.5).lock_args(), args(&["1", "two", "3.5"]));
        assert_eq!(().lock_args(), Vec::<String>::new());
        let owned = args(&["a", "b"]);
        assert_eq!(owned.as_slice().lock_args(), owned);
    }

    #[test]
    fn optional_provider_without_service() {
        let provider: Option<Arc<DistributedLockService>> = None;
        assert!(provider.lock_service().is_none());
    }

    #[test]
    fn spec_with_retry() {
        let spec = LockSpec::new("order:{0}", Duration::from_secs(5))
            .unwrap()
            .with_retry(RetryPolicy::none());
        assert_eq!(spec.retry, Some(RetryPolicy::none()));
        assert_eq!(spec.key.as_str(), "order:{0}");
    }
}

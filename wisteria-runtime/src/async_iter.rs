//! `asyncEach`/`asyncAll`: the two async iteration shapes spec.md §5
//! describes. Generic over any item/error/future type so `wisteria::exec`
//! can drive them with its own `Value`/`RenderError`/boxed futures without
//! this crate knowing about either.

use std::future::Future;

/// Runs `f` over `items` strictly in sequence, awaiting each iteration before
/// starting the next — `asyncEach`'s ordering guarantee.
pub async fn async_each<T, E, Fut>(
    items: Vec<T>,
    mut f: impl FnMut(usize, T) -> Fut,
) -> Result<(), E>
where
    Fut: Future<Output = Result<(), E>>,
{
    for (index, item) in items.into_iter().enumerate() {
        f(index, item).await?;
    }
    Ok(())
}

/// Runs `f` over `items` concurrently, then reassembles results in input
/// order regardless of completion order — `asyncAll`'s ordering guarantee.
/// The first error observed (by input index, not completion order) is
/// returned; later results are discarded.
pub async fn async_all<T, R, E, Fut>(
    items: Vec<T>,
    f: impl Fn(usize, T) -> Fut,
) -> Result<Vec<R>, E>
where
    Fut: Future<Output = Result<R, E>>,
{
    let futures = items.into_iter().enumerate().map(|(i, item)| f(i, item));
    let results = futures::future::join_all(futures).await;
    let mut out = Vec::with_capacity(results.len());
    for r in results {
        out.push(r?);
    }
    Ok(out)
}

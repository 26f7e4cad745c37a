use std::num::NonZeroUsize;

/// Number of workers used when none are configured.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Map `items` into `output`, preserving order, splitting the work across
/// `workers` scoped threads. Every worker first builds its own state with
/// `init` and hands it to each `transformer` call.
///
/// Returns the number of threads used.
pub fn parallel_compute<In, Out, State, I, F>(
    items: &[In],
    output: &mut Vec<Out>,
    workers: usize,
    threshold: usize,
    init: I,
    transformer: F,
) -> usize
where
    I: Fn() -> State + Sync,
    F: Fn(&mut State, &In) -> Out + Sync,
    In: Sync,
    Out: Send,
{
    let thread_count = match workers {
        0 => default_workers(),
        n => n,
    };

    output.reserve(items.len());

    // for small item counts, perform single-threaded
    if thread_count == 1 || items.len() < threshold.max(thread_count) {
        let mut state = init();
        for item in items {
            output.push(transformer(&mut state, item));
        }

        return 1;
    }

    let chunk_len = (items.len() + thread_count - 1) / thread_count;
    let init = &init;
    let transformer = &transformer;

    // multithreaded
    std::thread::scope(|s| {
        let mut threads = Vec::with_capacity(thread_count);

        for chunk in items.chunks(chunk_len) {
            let thread = s.spawn(move || {
                let mut state = init();
                let mut result = Vec::with_capacity(chunk.len());
                for item in chunk {
                    result.push(transformer(&mut state, item));
                }
                result
            });

            threads.push(thread);
        }

        let spawned = threads.len();
        for thread in threads {
            match thread.join() {
                Ok(chunk) => output.extend(chunk),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }

        spawned
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_inputs_stay_on_the_calling_thread() {
        let items: Vec<u32> = (0..10).collect();
        let mut output = Vec::new();

        let used = parallel_compute(&items, &mut output, 4, 512, || 0u32, |calls, n| {
            *calls += 1;
            (*n * 2, *calls)
        });

        assert_eq!(used, 1);
        assert_eq!(output.last(), Some(&(18, 10)));
    }

    #[test]
    fn preserves_order_across_workers() {
        let items: Vec<u32> = (0..10_000).collect();
        let mut output = Vec::new();

        let used = parallel_compute(&items, &mut output, 4, 0, || (), |_, n| n + 1);

        assert_eq!(used, 4);
        assert_eq!(output.len(), items.len());
        assert!(output.iter().zip(&items).all(|(out, n)| *out == n + 1));
    }

    #[test]
    fn every_worker_gets_fresh_state() {
        let items = vec![1u32; 100];
        let mut output = Vec::new();

        parallel_compute(&items, &mut output, 4, 0, Vec::new, |seen: &mut Vec<u32>, n| {
            seen.push(*n);
            seen.len()
        });

        // four chunks of 25, each counted from one
        assert_eq!(output.iter().filter(|&&len| len == 1).count(), 4);
        assert_eq!(output.iter().max(), Some(&25));
    }
}

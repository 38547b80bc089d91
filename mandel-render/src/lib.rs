//! Parallel computation of fractal grids.
//!
//! Each row of the grid is computed independently of every other.
//! A producer thread maps the request into a work item per row and queues them;
//! a fixed set of worker threads takes items off the queue and writes each
//! point straight into the row it was handed. Rows are allocated before any
//! worker starts, and each work item carries the only mutable borrow of its row,
//! so the grid itself is never locked.

use std::thread;

use mandel_core::{mandelbrot, sample_point, Error, FractalParameters, Grid, PointResult};

pub mod work_queue;

pub use work_queue::WorkQueue;

/// A contiguous run of points in one row, and everything needed to compute them.
#[derive(Debug)]
pub struct WorkItem<'a> {
    pub row: usize,
    /// The row's storage. Index `i` of this slice is column `start + i`.
    pub output: &'a mut [PointResult],
    pub start: usize,
    pub end: usize,
    pub limit: u32,
    pub escape_radius: f64,
    pub base_img: f64,
    pub base_real: f64,
    pub real_increment: f64,
}

impl WorkItem<'_> {
    /// Evaluates every point in [start, end).
    pub fn run(self) {
        for (index, out) in (self.start..self.end).zip(self.output.iter_mut()) {
            let point = sample_point(self.base_img, self.base_real, self.real_increment, index);
            *out = mandelbrot::evaluate(point, self.limit, self.escape_radius);
        }
    }
}

/// Concurrency used when the caller asks for "as many as there are cores".
pub fn default_concurrency() -> usize {
    rayon::current_num_threads()
}

/// Computes the grid for the given parameters.
///
/// With `concurrency` of 0 or 1 the grid is computed on the calling thread;
/// otherwise by `concurrency` worker threads fed by a producer.
/// The result is the same either way, bit for bit.
pub fn compute(params: &FractalParameters, concurrency: usize) -> Result<Grid, Error> {
    params.validate()?;

    let span = tracing::info_span!(
        "compute",
        width = params.samples_real,
        height = params.samples_img,
        concurrency
    );
    let _guard = span.enter();
    tracing::debug!(
        "computing ({}) to ({}) with limit {}",
        params.top_left,
        params.bottom_right,
        params.limit
    );

    let mut grid = Grid::new(params.samples_real, params.samples_img);
    if concurrency <= 1 {
        compute_serial(params, &mut grid);
    } else {
        // More workers than rows would only sit idle.
        let workers = concurrency.min(grid.height());
        compute_parallel(params, workers, &mut grid)?;
    }
    tracing::debug!("compute complete");
    Ok(grid)
}

fn work_items<'a>(
    params: &FractalParameters,
    grid: &'a mut Grid,
) -> impl Iterator<Item = WorkItem<'a>> + 'a {
    let params = *params;
    let real_increment = params.real_increment();
    grid.rows_mut().enumerate().map(move |(row, output)| WorkItem {
        row,
        start: 0,
        end: output.len(),
        output,
        limit: params.limit,
        escape_radius: params.escape_radius,
        base_img: params.row_base(row),
        base_real: params.top_left.re,
        real_increment,
    })
}

fn compute_serial(params: &FractalParameters, grid: &mut Grid) {
    for item in work_items(params, grid) {
        item.run();
    }
}

fn compute_parallel(
    params: &FractalParameters,
    workers: usize,
    grid: &mut Grid,
) -> Result<(), Error> {
    let rows = grid.height();
    let queue: WorkQueue<WorkItem<'_>> = WorkQueue::with_capacity(workers.saturating_mul(2));
    let items = work_items(params, grid);

    thread::scope(|s| {
        let queue = &queue;
        let mut handles = Vec::new();
        let mut spawn_error = None;

        for id in 0..workers {
            let spawned = thread::Builder::new()
                .name(format!("compute-worker-{}", id))
                .spawn_scoped(s, move || consume(queue, WorkItem::run));
            match spawned {
                Ok(h) => handles.push(h),
                Err(err) => {
                    spawn_error = Some(err);
                    break;
                }
            }
        }

        if spawn_error.is_none() {
            let spawned = thread::Builder::new()
                .name("compute-producer".to_owned())
                .spawn_scoped(s, move || produce(queue, items, rows));
            match spawned {
                Ok(h) => handles.push(h),
                Err(err) => spawn_error = Some(err),
            }
        }

        if let Some(err) = spawn_error {
            // Release any workers that did start; nothing will feed them.
            queue.mark_finished();
            tracing::error!("could not start compute thread: {}", err);
            return Err(Error::Internal(format!(
                "could not start compute thread: {}",
                err
            )));
        }

        let mut panicked = 0;
        for h in handles {
            if h.join().is_err() {
                panicked += 1;
            }
        }
        if panicked > 0 {
            tracing::error!("{} compute threads panicked", panicked);
            return Err(Error::Internal(format!(
                "{} compute threads panicked",
                panicked
            )));
        }
        if queue.completed() != rows {
            return Err(Error::Internal(format!(
                "computed {} of {} rows",
                queue.completed(),
                rows
            )));
        }
        Ok(())
    })
}

/// Closes the queue when dropped, so a thread that unwinds
/// cannot leave its peers blocked on the queue.
struct FinishOnDrop<'q, T>(&'q WorkQueue<T>);

impl<T> Drop for FinishOnDrop<'_, T> {
    fn drop(&mut self) {
        self.0.mark_finished();
    }
}

fn consume<T>(queue: &WorkQueue<T>, mut work: impl FnMut(T)) {
    let _finish = FinishOnDrop(queue);
    while let Some(item) = queue.pop() {
        work(item);
        queue.complete_one();
    }
}

fn produce<'a>(
    queue: &WorkQueue<WorkItem<'a>>,
    items: impl Iterator<Item = WorkItem<'a>>,
    rows: usize,
) {
    let _finish = FinishOnDrop(queue);

    let report_every = (rows / 10).max(1);
    for item in items {
        let row = item.row;
        if queue.push(item).is_err() {
            tracing::warn!("work queue closed early at row {}", row);
            return;
        }
        if row % report_every == 0 {
            tracing::debug!("queued row {}/{}; {} complete", row, rows, queue.completed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num::complex::Complex64;

    fn params(width: usize, height: usize, limit: u32) -> FractalParameters {
        FractalParameters::new(
            Complex64::new(-2.0, 1.0),
            Complex64::new(1.0, -1.0),
            4.0,
            limit,
            width,
            height,
        )
        .unwrap()
    }

    #[test]
    fn deterministic_across_concurrency() {
        let p = params(97, 53, 200);
        let serial = compute(&p, 1).unwrap();
        assert_eq!(compute(&p, 0).unwrap(), serial);
        for concurrency in [2, 4, 7] {
            let parallel = compute(&p, concurrency).unwrap();
            // PartialEq on f64 is not bitwise; compare bits explicitly.
            for (a, b) in serial.points().zip(parallel.points()) {
                assert_eq!(a.last_value.re.to_bits(), b.last_value.re.to_bits());
                assert_eq!(a.last_value.im.to_bits(), b.last_value.im.to_bits());
                assert_eq!(a.last_modulus.to_bits(), b.last_modulus.to_bits());
                assert_eq!(a.iterations, b.iterations);
                assert_eq!(a.diverged, b.diverged);
            }
        }
    }

    #[test]
    fn more_workers_than_rows() {
        let p = params(10, 10, 20);
        assert_eq!(compute(&p, 32).unwrap(), compute(&p, 1).unwrap());
    }

    #[test]
    fn huge_concurrency() {
        let p = params(10, 12, 20);
        let serial = compute(&p, 1).unwrap();
        assert_eq!(compute(&p, usize::MAX).unwrap(), serial);
        assert_eq!(compute(&p, usize::MAX / 2 + 1).unwrap(), serial);
    }

    #[test]
    fn failed_worker_releases_producer() {
        let queue = WorkQueue::with_capacity(1);
        thread::scope(|s| {
            let worker = s.spawn(|| consume(&queue, |_: usize| panic!("worker failed")));
            // Without the worker closing the queue, this would block forever.
            let refused = (0..100).filter(|&i| queue.push(i).is_err()).count();
            assert!(refused > 0);
            assert!(worker.join().is_err());
        });
        assert!(queue.is_finished());
        assert_eq!(queue.completed(), 0);
    }

    #[test]
    fn known_points() {
        let p = params(10, 10, 50);
        let grid = compute(&p, 3).unwrap();
        assert_eq!(grid.width(), 10);
        assert_eq!(grid.height(), 10);

        // Row 5 is 0.0i; column 7 is 0.1 + 0i, near the origin.
        let near_origin = grid.row(5).unwrap()[7];
        assert!((p.coordinate(5, 7) - Complex64::new(0.1, 0.0)).norm() < 1e-9);
        assert!(!near_origin.diverged);
        assert_eq!(near_origin.iterations, 50);

        // Row 9, column 0 is -2 + 0.8i, the sample closest to the top-left corner.
        let corner = grid.row(9).unwrap()[0];
        assert!((p.coordinate(9, 0) - Complex64::new(-2.0, 0.8)).norm() < 1e-9);
        assert!(corner.diverged);
        assert!(corner.iterations < 10);
    }

    #[test]
    fn row_zero_is_the_bottom_edge() {
        let p = params(10, 10, 20);
        let mut grid = Grid::new(10, 10);
        let items: Vec<_> = work_items(&p, &mut grid).collect();
        assert_eq!(items.len(), 10);
        assert_eq!(items[0].base_img, -1.0);
        assert_eq!(items[0].base_real, -2.0);
        assert!((items[0].real_increment - 0.3).abs() < 1e-12);
        assert!(items[9].base_img > items[0].base_img);
        assert!(items.iter().all(|item| item.start == 0 && item.end == 10));
    }

    #[test]
    fn partial_work_item() {
        let p = params(10, 10, 20);
        let mut row = vec![PointResult::default(); 4];
        WorkItem {
            row: 5,
            output: &mut row,
            start: 3,
            end: 7,
            limit: p.limit,
            escape_radius: p.escape_radius,
            base_img: p.row_base(5),
            base_real: p.top_left.re,
            real_increment: p.real_increment(),
        }
        .run();
        for (i, got) in row.iter().enumerate() {
            let expected = mandelbrot::evaluate(p.coordinate(5, 3 + i), p.limit, p.escape_radius);
            assert_eq!(*got, expected);
        }
    }

    #[test]
    fn rejects_invalid_parameters() {
        let mut p = params(10, 10, 20);
        p.limit = 5;
        assert!(matches!(compute(&p, 2), Err(Error::InvalidArgument(_))));
    }
}

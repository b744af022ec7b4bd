use ndarray::ArrayView1;
use num_traits::{Float, ToPrimitive};

pub trait DistanceMeasure {
    fn distance<T>(&self, a: ArrayView1<T>, b: ArrayView1<T>) -> f64
    where
        T: Float + ToPrimitive;
}

pub struct SquaredEuclidean;

impl DistanceMeasure for SquaredEuclidean {
    fn distance<T>(&self, a: ArrayView1<T>, b: ArrayView1<T>) -> f64
    where
        T: Float + ToPrimitive,
    {
        let mut squared_dist = T::zero();
        for i in 0..a.len() {
            let diff = a[i] - b[i];
            squared_dist = squared_dist + diff * diff;
        }
        squared_dist.to_f64().unwrap_or(f64::INFINITY)
    }
}

pub struct Euclidean;

impl DistanceMeasure for Euclidean {
    fn distance<T>(&self, a: ArrayView1<T>, b: ArrayView1<T>) -> f64
    where
        T: Float + ToPrimitive,
    {
        SquaredEuclidean.distance(a, b).sqrt()
    }
}

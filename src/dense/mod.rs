use crate::utils::{ColumnScaling, Standardize};
use ndarray::{Array1, Array2, Axis};

impl Standardize for Array2<f64> {
    fn center_columns(&mut self) -> Array1<f64> {
        let means = match self.mean_axis(Axis(0)) {
            Some(means) => means,
            None => return Array1::zeros(self.ncols()),
        };
        for mut row in self.rows_mut() {
            row -= &means;
        }
        means
    }

    fn standardize_columns(&mut self) -> ColumnScaling {
        let n_cols = self.ncols();
        if self.nrows() == 0 {
            return ColumnScaling {
                means: Array1::zeros(n_cols),
                divisors: Array1::ones(n_cols),
            };
        }

        let constant: Vec<bool> = self
            .columns()
            .into_iter()
            .map(|col| col.iter().all(|&v| v == col[0]))
            .collect();

        let means = self.center_columns();
        let std_dev = self.std_axis(Axis(0), 0.0);
        let mut divisors = Array1::ones(n_cols);

        for (j, mut col) in self.columns_mut().into_iter().enumerate() {
            let spread = std_dev[j];
            if constant[j] || spread == 0.0 {
                col.fill(0.0);
            } else {
                col /= spread;
                divisors[j] = spread;
            }
        }

        ColumnScaling { means, divisors }
    }
}

pub mod channel;
pub mod histogram;
pub mod image_grid;
pub mod mutual_information;
pub mod overlap;
pub mod preprocess;
pub mod utils;

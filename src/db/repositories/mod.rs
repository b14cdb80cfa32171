pub mod volume_readings;

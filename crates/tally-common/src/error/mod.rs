pub mod portal_error;

pub mod freeloader;

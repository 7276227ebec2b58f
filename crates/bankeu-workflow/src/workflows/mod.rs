pub mod bankeu;

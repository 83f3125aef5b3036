pub mod p901_inventory_directory;

fn main() {
    ink_fluid::start();
}

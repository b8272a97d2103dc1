fn main() {
    drivelabel_lib::run()
}
